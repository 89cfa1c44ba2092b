use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper for node IDs. Node 0 is the entry point of every story.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The conventional entry node.
    pub const ENTRY: NodeId = NodeId(0);

    /// The id following this one, used for `max + 1` allocation. `None` at
    /// `u32::MAX`.
    pub fn next(self) -> Option<NodeId> {
        self.0.checked_add(1).map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Authoring position of a node in the editor canvas. Ignored at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The facial expression a speaker is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Emotion {
    #[default]
    Normal,
    Happy,
    Sad,
    Angry,
}

impl Emotion {
    pub const ALL: [Emotion; 4] = [Self::Normal, Self::Happy, Self::Sad, Self::Angry];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Happy => "Happy",
            Self::Sad => "Sad",
            Self::Angry => "Angry",
        }
    }

    pub fn from_name(name: &str) -> Option<Emotion> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

/// How a Setter node applies its value to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SetMode {
    /// Overwrite the field with the value.
    #[default]
    Set,
    /// Add the value to the field.
    Add,
}

impl SetMode {
    pub const ALL: [SetMode; 2] = [Self::Set, Self::Add];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Set => "Set",
            Self::Add => "Add",
        }
    }

    pub fn from_name(name: &str) -> Option<SetMode> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// A labeled outgoing edge.
///
/// On Dialogue nodes the label is the option text shown to the player. On
/// Switch nodes it encodes a condition as `field;operator;value`. A `None`
/// target means the edge is unresolved (its destination no longer exists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub target: Option<NodeId>,
}

impl Choice {
    pub fn new(label: impl Into<String>, target: NodeId) -> Self {
        Self {
            label: label.into(),
            target: Some(target),
        }
    }

    pub fn unresolved(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: None,
        }
    }
}

/// The node types an author can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Dialogue,
    Setter,
    Switch,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dialogue => "Dialogue",
            Self::Setter => "Setter",
            Self::Switch => "Switch",
        }
    }

    pub fn from_name(name: &str) -> Option<NodeType> {
        match name {
            "Dialogue" => Some(Self::Dialogue),
            "Setter" => Some(Self::Setter),
            "Switch" => Some(Self::Switch),
            _ => None,
        }
    }
}

/// A line spoken (or narrated) to the player, followed by its options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DialogueNode {
    /// Character name. Empty means narration.
    pub speaker: String,
    pub emotion: Emotion,
    pub text: String,
    /// Background name, `KEEP_BACKGROUND`, or empty.
    pub background: String,
    pub choices: Vec<Choice>,
}

/// Mutates one field and continues unconditionally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetterNode {
    pub field: String,
    pub value: i64,
    pub mode: SetMode,
    /// At most one continuation. Zero means the node is not wired up yet.
    pub choices: Vec<Choice>,
}

impl SetterNode {
    pub fn continuation(&self) -> Option<&Choice> {
        self.choices.first()
    }
}

/// Branches on the first choice whose condition label holds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwitchNode {
    pub choices: Vec<Choice>,
}

/// Type-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Dialogue(DialogueNode),
    Setter(SetterNode),
    Switch(SwitchNode),
    /// A type tag this engine does not understand, kept so the story can be
    /// inspected and re-saved without losing the node.
    Unknown { type_name: String, choices: Vec<Choice> },
}

impl NodeKind {
    /// An empty payload for a freshly created node.
    pub fn empty(node_type: NodeType) -> NodeKind {
        match node_type {
            NodeType::Dialogue => NodeKind::Dialogue(DialogueNode::default()),
            NodeType::Setter => NodeKind::Setter(SetterNode::default()),
            NodeType::Switch => NodeKind::Switch(SwitchNode::default()),
        }
    }

    pub fn node_type(&self) -> Option<NodeType> {
        match self {
            NodeKind::Dialogue(_) => Some(NodeType::Dialogue),
            NodeKind::Setter(_) => Some(NodeType::Setter),
            NodeKind::Switch(_) => Some(NodeType::Switch),
            NodeKind::Unknown { .. } => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            NodeKind::Unknown { type_name, .. } => type_name,
            other => other.node_type().map(|t| t.name()).unwrap_or_default(),
        }
    }

    pub fn choices(&self) -> &[Choice] {
        match self {
            NodeKind::Dialogue(d) => &d.choices,
            NodeKind::Setter(s) => &s.choices,
            NodeKind::Switch(s) => &s.choices,
            NodeKind::Unknown { choices, .. } => choices,
        }
    }

    pub fn choices_mut(&mut self) -> &mut Vec<Choice> {
        match self {
            NodeKind::Dialogue(d) => &mut d.choices,
            NodeKind::Setter(s) => &mut s.choices,
            NodeKind::Switch(s) => &mut s.choices,
            NodeKind::Unknown { choices, .. } => choices,
        }
    }
}

/// One unit of the story graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Position,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, node_type: NodeType, position: Position) -> Self {
        Self {
            id,
            position,
            kind: NodeKind::empty(node_type),
        }
    }

    pub fn dialogue(id: NodeId, payload: DialogueNode) -> Self {
        Self {
            id,
            position: Position::default(),
            kind: NodeKind::Dialogue(payload),
        }
    }

    pub fn setter(id: NodeId, payload: SetterNode) -> Self {
        Self {
            id,
            position: Position::default(),
            kind: NodeKind::Setter(payload),
        }
    }

    pub fn switch(id: NodeId, payload: SwitchNode) -> Self {
        Self {
            id,
            position: Position::default(),
            kind: NodeKind::Switch(payload),
        }
    }

    pub fn choices(&self) -> &[Choice] {
        self.kind.choices()
    }

    /// Ids this node points at, skipping unresolved edges.
    pub fn targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.choices().iter().filter_map(|c| c.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payloads_match_type() {
        for t in [NodeType::Dialogue, NodeType::Setter, NodeType::Switch] {
            let node = Node::new(NodeId(3), t, Position::new(10.0, 20.0));
            assert_eq!(node.kind.node_type(), Some(t));
            assert!(node.choices().is_empty());
        }
    }

    #[test]
    fn unknown_kind_keeps_type_name() {
        let kind = NodeKind::Unknown {
            type_name: "Jump".to_string(),
            choices: vec![Choice::new("x", NodeId(1))],
        };
        assert_eq!(kind.type_name(), "Jump");
        assert_eq!(kind.node_type(), None);
        assert_eq!(kind.choices().len(), 1);
    }

    #[test]
    fn targets_skip_unresolved() {
        let node = Node::dialogue(
            NodeId(0),
            DialogueNode {
                choices: vec![
                    Choice::new("a", NodeId(1)),
                    Choice::unresolved("b"),
                    Choice::new("c", NodeId(2)),
                ],
                ..Default::default()
            },
        );
        assert_eq!(node.targets().collect::<Vec<_>>(), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn emotion_names_round_trip() {
        for e in Emotion::ALL {
            assert_eq!(Emotion::from_name(e.name()), Some(e));
        }
        assert_eq!(Emotion::from_name("Bored"), None);
    }

    #[test]
    fn node_id_display_and_next() {
        assert_eq!(NodeId(7).to_string(), "#7");
        assert_eq!(NodeId(7).next(), Some(NodeId(8)));
        assert_eq!(NodeId(u32::MAX).next(), None);
        assert_eq!(NodeId::default(), NodeId::ENTRY);
    }
}
