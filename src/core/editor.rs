/// Graph editing session: an isolated working copy of a story graph that is
/// either committed back or discarded.

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::graph::{EditError, StoryGraph};
use crate::schema::inspector::{self, PropertyValue};
use crate::schema::node::{Choice, Node, NodeId, NodeType, Position};
use crate::schema::story::StoryError;

/// Horizontal gap between a node and a node created from one of its choices.
const LINKED_NODE_OFFSET_X: f32 = 258.0;
/// Vertical spacing between sibling nodes created from the same source.
const LINKED_NODE_STEP_Y: f32 = 202.0;
/// Label given to the choice created alongside a linked node.
const LINKED_CHOICE_LABEL: &str = "Continue";

/// Edits apply to a private deep copy; the durable graph only changes on
/// `commit`.
#[derive(Debug, Clone)]
pub struct EditingSession {
    working: StoryGraph,
    dirty: bool,
}

impl EditingSession {
    pub fn open(durable: &StoryGraph) -> Self {
        Self {
            working: durable.clone(),
            dirty: false,
        }
    }

    pub fn working(&self) -> &StoryGraph {
        &self.working
    }

    /// Whether anything changed since the session was opened or last
    /// committed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn add_node(&mut self, node_type: NodeType, position: Position) -> NodeId {
        self.dirty = true;
        let id = self.working.add_node(node_type, position);
        tracing::debug!(node = %id, kind = node_type.name(), "node added");
        id
    }

    pub fn add_choice(&mut self, source: NodeId, label: &str, target: NodeId) -> Result<(), EditError> {
        self.working.add_choice(source, label, target)?;
        self.dirty = true;
        Ok(())
    }

    /// Create a Dialogue node beside `source` and link to it with a
    /// "Continue" choice. Returns the new node's id.
    pub fn add_linked_node(&mut self, source: NodeId) -> Result<NodeId, EditError> {
        let origin = self
            .working
            .node(source)
            .ok_or(EditError::UnknownNode(source))?;
        let siblings = origin.choices().len() as f32;
        let position = Position::new(
            origin.position.x + LINKED_NODE_OFFSET_X,
            origin.position.y + LINKED_NODE_STEP_Y * siblings,
        );
        let id = self.add_node(NodeType::Dialogue, position);
        self.working.add_choice(source, LINKED_CHOICE_LABEL, id)?;
        Ok(id)
    }

    pub fn remove_choice(&mut self, source: NodeId, index: usize) -> Result<Choice, EditError> {
        let removed = self.working.remove_choice(source, index)?;
        self.dirty = true;
        Ok(removed)
    }

    /// Re-point an existing choice. `None`, or an id with no node, leaves it
    /// unresolved.
    pub fn set_target(&mut self, source: NodeId, index: usize, target: Option<NodeId>) -> Result<(), EditError> {
        self.working.set_target(source, index, target)?;
        self.dirty = true;
        Ok(())
    }

    /// Rewrite the label of a choice (option text, or a Switch condition).
    pub fn set_choice_label(&mut self, source: NodeId, index: usize, label: &str) -> Result<(), EditError> {
        let choice = self
            .working
            .node_mut(source)?
            .kind
            .choices_mut()
            .get_mut(index)
            .ok_or(EditError::ChoiceOutOfRange { node: source, index })?;
        choice.label = label.to_string();
        self.dirty = true;
        Ok(())
    }

    /// Delete a node and strip every choice that pointed at it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Node, EditError> {
        let removed = self.working.delete_node(id)?;
        self.dirty = true;
        tracing::debug!(node = %id, "node deleted");
        Ok(removed)
    }

    pub fn move_node(&mut self, id: NodeId, position: Position) -> Result<(), EditError> {
        self.working.node_mut(id)?.position = position;
        self.dirty = true;
        Ok(())
    }

    /// Write an editable property, as listed by
    /// `NodeType::editable_properties`.
    pub fn set_property(&mut self, id: NodeId, name: &str, value: PropertyValue) -> Result<(), EditError> {
        let node = self.working.node_mut(id)?;
        inspector::set_property(&mut node.kind, name, value).map_err(|reason| EditError::Property {
            node: id,
            property: name.to_string(),
            reason,
        })?;
        self.dirty = true;
        Ok(())
    }

    /// Compact node ids to `0..len`. Returns the old → new mapping.
    pub fn renumber(&mut self) -> BTreeMap<NodeId, NodeId> {
        self.dirty = true;
        self.working.renumber()
    }

    /// Replace the durable graph with a fresh deep copy of the working copy.
    /// The session stays open for further edits.
    pub fn commit(&mut self, durable: &mut StoryGraph) {
        *durable = self.working.clone();
        self.dirty = false;
        tracing::info!(nodes = durable.len(), "story committed");
    }

    /// Write the working copy to a RON story file.
    pub fn commit_to_file(&mut self, path: &Path) -> Result<(), StoryError> {
        self.working.to_story().save_to_ron(path)?;
        self.dirty = false;
        tracing::info!(path = %path.display(), "story saved");
        Ok(())
    }

    /// Drop the working copy, leaving the durable graph untouched.
    pub fn discard(self) {
        if self.dirty {
            tracing::info!("discarding uncommitted story edits");
        }
    }
}
