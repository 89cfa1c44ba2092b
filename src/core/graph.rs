/// Story graph: the node arena plus the structural edits that keep it well
/// formed.
///
/// Edges are plain target ids resolved lazily by lookup, so cycles need no
/// special handling except in traversals, which carry a visited set.

use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::schema::node::{Choice, Node, NodeId, NodeKind, NodeType, Position};
use crate::schema::story::{Background, Character, StoryData, StoryError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("no node with id {0}")]
    UnknownNode(NodeId),
    #[error("node {node} has no choice at index {index}")]
    ChoiceOutOfRange { node: NodeId, index: usize },
    #[error("the entry node {0} cannot be deleted")]
    EntryNode(NodeId),
    #[error("property '{property}' on node {node}: {reason}")]
    Property {
        node: NodeId,
        property: String,
        reason: String,
    },
}

/// The authored graph plus the character, background and field tables it
/// refers to. `Clone` is a full deep copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoryGraph {
    characters: Vec<Character>,
    backgrounds: Vec<Background>,
    fields: Vec<String>,
    nodes: BTreeMap<NodeId, Node>,
}

impl StoryGraph {
    /// A graph holding only an empty entry node.
    pub fn new() -> Self {
        let mut graph = Self::default();
        graph.ensure_entry();
        graph
    }

    /// Build the node table in a single flat pass, then fix up edges.
    ///
    /// - node 0 is synthesized when missing
    /// - choices pointing at ids that do not exist become unresolved
    /// - Setter nodes keep only their first choice
    pub fn from_story(story: StoryData) -> Result<StoryGraph, StoryError> {
        let mut nodes = BTreeMap::new();
        for node in story.nodes {
            let id = node.id;
            if nodes.insert(id, node).is_some() {
                return Err(StoryError::DuplicateNode(id));
            }
        }

        let mut graph = StoryGraph {
            characters: story.characters,
            backgrounds: story.backgrounds,
            fields: story.fields,
            nodes,
        };
        graph.ensure_entry();

        let known: FxHashSet<NodeId> = graph.nodes.keys().copied().collect();
        for node in graph.nodes.values_mut() {
            let id = node.id;
            for choice in node.kind.choices_mut() {
                if let Some(target) = choice.target {
                    if !known.contains(&target) {
                        tracing::warn!(node = %id, target = %target, "choice points at a missing node; marking unresolved");
                        choice.target = None;
                    }
                }
            }
            if let NodeKind::Setter(setter) = &mut node.kind {
                if setter.choices.len() > 1 {
                    tracing::warn!(node = %id, count = setter.choices.len(), "setter has more than one choice; keeping the first");
                    setter.choices.truncate(1);
                }
            }
        }

        Ok(graph)
    }

    /// Flatten back into story data, nodes in id order.
    pub fn to_story(&self) -> StoryData {
        StoryData {
            characters: self.characters.clone(),
            backgrounds: self.backgrounds.clone(),
            fields: self.fields.clone(),
            nodes: self.nodes.values().cloned().collect(),
        }
    }

    fn ensure_entry(&mut self) {
        if !self.nodes.contains_key(&NodeId::ENTRY) {
            tracing::debug!("entry node missing; synthesizing an empty one");
            self.nodes.insert(
                NodeId::ENTRY,
                Node::new(NodeId::ENTRY, NodeType::Dialogue, Position::default()),
            );
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn backgrounds(&self) -> &[Background] {
        &self.backgrounds
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name == name)
    }

    pub fn background(&self, name: &str) -> Option<&Background> {
        self.backgrounds.iter().find(|b| b.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// The id the next `add_node` will hand out: max + 1, or the lowest
    /// unused id once the max is `u32::MAX`.
    pub fn next_id(&self) -> NodeId {
        match self.nodes.keys().next_back() {
            None => NodeId::ENTRY,
            Some(max) => max.next().unwrap_or_else(|| self.lowest_unused_id()),
        }
    }

    fn lowest_unused_id(&self) -> NodeId {
        let mut candidate = NodeId::ENTRY;
        for id in self.nodes.keys() {
            if *id != candidate {
                break;
            }
            match candidate.next() {
                Some(next) => candidate = next,
                None => break,
            }
        }
        candidate
    }

    /// Every node reachable from the entry node by following resolved edges.
    pub fn reachable(&self) -> FxHashSet<NodeId> {
        let mut visited = FxHashSet::default();
        let mut stack = vec![NodeId::ENTRY];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !visited.insert(id) {
                continue;
            }
            stack.extend(node.targets().filter(|t| !visited.contains(t)));
        }
        visited
    }

    /// Nodes that cannot be reached from the entry node, in id order.
    pub fn orphans(&self) -> Vec<NodeId> {
        let reachable = self.reachable();
        self.nodes
            .keys()
            .filter(|id| !reachable.contains(id))
            .copied()
            .collect()
    }

    // Structural edits. Only the editing session calls these.

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, EditError> {
        self.nodes.get_mut(&id).ok_or(EditError::UnknownNode(id))
    }

    pub(crate) fn add_node(&mut self, node_type: NodeType, position: Position) -> NodeId {
        let id = self.next_id();
        self.nodes.insert(id, Node::new(id, node_type, position));
        id
    }

    /// Append a choice. Setter nodes hold at most one, so on them the new
    /// choice replaces the existing one. A target that does not exist is
    /// stored as unresolved.
    pub(crate) fn add_choice(
        &mut self,
        source: NodeId,
        label: &str,
        target: NodeId,
    ) -> Result<(), EditError> {
        let resolved = if self.nodes.contains_key(&target) {
            Some(target)
        } else {
            tracing::warn!(node = %source, target = %target, "adding choice to a missing node; stored as unresolved");
            None
        };
        let node = self.node_mut(source)?;
        let choice = Choice {
            label: label.to_string(),
            target: resolved,
        };
        match &mut node.kind {
            NodeKind::Setter(setter) => {
                setter.choices.clear();
                setter.choices.push(choice);
            }
            kind => kind.choices_mut().push(choice),
        }
        Ok(())
    }

    pub(crate) fn remove_choice(&mut self, source: NodeId, index: usize) -> Result<Choice, EditError> {
        let choices = self.node_mut(source)?.kind.choices_mut();
        if index >= choices.len() {
            return Err(EditError::ChoiceOutOfRange {
                node: source,
                index,
            });
        }
        Ok(choices.remove(index))
    }

    pub(crate) fn set_target(
        &mut self,
        source: NodeId,
        index: usize,
        target: Option<NodeId>,
    ) -> Result<(), EditError> {
        let target = target.filter(|t| self.nodes.contains_key(t));
        let choice = self
            .node_mut(source)?
            .kind
            .choices_mut()
            .get_mut(index)
            .ok_or(EditError::ChoiceOutOfRange {
                node: source,
                index,
            })?;
        choice.target = target;
        Ok(())
    }

    /// Remove a node and every choice, on every other node, that pointed at
    /// it. Later choices shift down, keeping their relative order.
    pub(crate) fn delete_node(&mut self, id: NodeId) -> Result<Node, EditError> {
        if id == NodeId::ENTRY {
            return Err(EditError::EntryNode(id));
        }
        let removed = self.nodes.remove(&id).ok_or(EditError::UnknownNode(id))?;
        for node in self.nodes.values_mut() {
            node.kind
                .choices_mut()
                .retain(|choice| choice.target != Some(id));
        }
        Ok(removed)
    }

    /// Compact ids to `0..len` keeping their order, rewriting every edge.
    /// Returns the old → new mapping.
    pub(crate) fn renumber(&mut self) -> BTreeMap<NodeId, NodeId> {
        let mapping: BTreeMap<NodeId, NodeId> = self
            .nodes
            .keys()
            .enumerate()
            .map(|(i, old)| (*old, NodeId(i as u32)))
            .collect();

        let old_nodes = std::mem::take(&mut self.nodes);
        for (old, mut node) in old_nodes {
            let new = mapping[&old];
            node.id = new;
            for choice in node.kind.choices_mut() {
                choice.target = choice.target.and_then(|t| mapping.get(&t).copied());
            }
            self.nodes.insert(new, node);
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::node::{DialogueNode, SetterNode, SwitchNode};

    fn line(text: &str, choices: Vec<Choice>) -> DialogueNode {
        DialogueNode {
            text: text.to_string(),
            choices,
            ..Default::default()
        }
    }

    fn sample() -> StoryGraph {
        StoryGraph::from_story(StoryData {
            fields: vec!["hp".to_string()],
            nodes: vec![
                Node::dialogue(
                    NodeId(0),
                    line("start", vec![Choice::new("a", NodeId(1)), Choice::new("b", NodeId(2))]),
                ),
                Node::dialogue(NodeId(1), line("one", vec![Choice::new("back", NodeId(0))])),
                Node::switch(
                    NodeId(2),
                    SwitchNode {
                        choices: vec![
                            Choice::new("hp;>;0", NodeId(1)),
                            Choice::new("hp;<;0", NodeId(3)),
                            Choice::new("x;Always;0", NodeId(1)),
                        ],
                    },
                ),
                Node::dialogue(NodeId(3), line("end", vec![])),
                Node::dialogue(NodeId(7), line("orphan", vec![Choice::new("to 3", NodeId(3))])),
            ],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn entry_node_is_synthesized() {
        let graph = StoryGraph::from_story(StoryData::default()).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(matches!(
            graph.node(NodeId::ENTRY).map(|n| &n.kind),
            Some(NodeKind::Dialogue(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let story = StoryData {
            nodes: vec![
                Node::dialogue(NodeId(0), DialogueNode::default()),
                Node::dialogue(NodeId(0), DialogueNode::default()),
            ],
            ..Default::default()
        };
        assert!(matches!(
            StoryGraph::from_story(story),
            Err(StoryError::DuplicateNode(NodeId(0)))
        ));
    }

    #[test]
    fn dangling_targets_become_unresolved() {
        let story = StoryData {
            nodes: vec![Node::dialogue(
                NodeId(0),
                line("start", vec![Choice::new("gone", NodeId(42))]),
            )],
            ..Default::default()
        };
        let graph = StoryGraph::from_story(story).unwrap();
        assert_eq!(graph.node(NodeId(0)).unwrap().choices()[0].target, None);
    }

    #[test]
    fn setter_surplus_choices_are_trimmed() {
        let story = StoryData {
            nodes: vec![
                Node::setter(
                    NodeId(0),
                    SetterNode {
                        choices: vec![Choice::new("", NodeId(1)), Choice::new("", NodeId(0))],
                        ..Default::default()
                    },
                ),
                Node::dialogue(NodeId(1), DialogueNode::default()),
            ],
            ..Default::default()
        };
        let graph = StoryGraph::from_story(story).unwrap();
        assert_eq!(graph.node(NodeId(0)).unwrap().choices().len(), 1);
    }

    #[test]
    fn add_node_after_max_id_reuses_lowest_gap() {
        let mut graph = StoryGraph::from_story(StoryData {
            nodes: vec![
                Node::dialogue(NodeId(0), DialogueNode::default()),
                Node::dialogue(NodeId(1), DialogueNode::default()),
                Node::dialogue(NodeId(u32::MAX), DialogueNode::default()),
            ],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(graph.next_id(), NodeId(2));
        let id = graph.add_node(NodeType::Dialogue, Position::default());
        assert_eq!(id, NodeId(2));
        assert_eq!(graph.add_node(NodeType::Switch, Position::default()), NodeId(3));
        assert_eq!(graph.len(), 5);
    }

    #[test]
    fn add_node_allocates_max_plus_one() {
        let mut graph = sample();
        let id = graph.add_node(NodeType::Setter, Position::new(1.0, 2.0));
        assert_eq!(id, NodeId(8));
        let node = graph.node(id).unwrap();
        assert_eq!(node.position, Position::new(1.0, 2.0));
        assert!(matches!(node.kind, NodeKind::Setter(_)));
    }

    #[test]
    fn add_choice_replaces_on_setter() {
        let mut graph = sample();
        let setter = graph.add_node(NodeType::Setter, Position::default());
        graph.add_choice(setter, "", NodeId(1)).unwrap();
        graph.add_choice(setter, "", NodeId(3)).unwrap();
        let choices = graph.node(setter).unwrap().choices();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].target, Some(NodeId(3)));
    }

    #[test]
    fn add_choice_to_missing_target_is_unresolved() {
        let mut graph = sample();
        graph.add_choice(NodeId(3), "nowhere", NodeId(99)).unwrap();
        assert_eq!(graph.node(NodeId(3)).unwrap().choices()[0].target, None);
        assert_eq!(
            graph.add_choice(NodeId(99), "x", NodeId(0)),
            Err(EditError::UnknownNode(NodeId(99)))
        );
    }

    #[test]
    fn delete_strips_incoming_choices_and_keeps_order() {
        let mut graph = sample();
        let before = graph.len();
        graph.delete_node(NodeId(1)).unwrap();
        assert_eq!(graph.len(), before - 1);
        for node in graph.nodes() {
            assert!(node.targets().all(|t| t != NodeId(1)));
        }
        let switch = graph.node(NodeId(2)).unwrap();
        assert_eq!(switch.choices().len(), 1);
        assert_eq!(switch.choices()[0].label, "hp;<;0");
        let start = graph.node(NodeId(0)).unwrap();
        assert_eq!(start.choices().len(), 1);
        assert_eq!(start.choices()[0].label, "b");
    }

    #[test]
    fn delete_entry_or_unknown_fails() {
        let mut graph = sample();
        assert_eq!(
            graph.delete_node(NodeId(0)),
            Err(EditError::EntryNode(NodeId(0)))
        );
        assert_eq!(
            graph.delete_node(NodeId(50)),
            Err(EditError::UnknownNode(NodeId(50)))
        );
    }

    #[test]
    fn reachability_handles_cycles() {
        let graph = sample();
        let reachable = graph.reachable();
        assert_eq!(reachable.len(), 4);
        assert!(!reachable.contains(&NodeId(7)));
        assert_eq!(graph.orphans(), vec![NodeId(7)]);
    }

    #[test]
    fn renumber_compacts_and_rewrites_edges() {
        let mut graph = sample();
        graph.delete_node(NodeId(2)).unwrap();
        let mapping = graph.renumber();
        assert_eq!(mapping[&NodeId(0)], NodeId(0));
        assert_eq!(mapping[&NodeId(3)], NodeId(2));
        assert_eq!(mapping[&NodeId(7)], NodeId(3));
        assert_eq!(graph.nodes().map(|n| n.id.0).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        let former_orphan = graph.node(NodeId(3)).unwrap();
        assert_eq!(former_orphan.choices()[0].target, Some(NodeId(2)));
    }

    #[test]
    fn clone_is_deep() {
        let original = sample();
        let mut copy = original.clone();
        copy.add_choice(NodeId(3), "more", NodeId(0)).unwrap();
        assert!(original.node(NodeId(3)).unwrap().choices().is_empty());
        assert_ne!(original, copy);
    }

    #[test]
    fn to_story_round_trip() {
        let graph = sample();
        let rebuilt = StoryGraph::from_story(graph.to_story()).unwrap();
        assert_eq!(rebuilt, graph);
    }
}
