/// Editable-property descriptors for each node type.
///
/// Authoring tools iterate these to build their property panels instead of
/// inspecting node structs directly, and write values back through
/// [`set_property`].

use serde::{Deserialize, Serialize};

use super::node::{Emotion, NodeKind, NodeType, SetMode};
use super::story::KEEP_BACKGROUND;

/// The kind of editor widget a property needs, with its option source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Free text.
    Text,
    Integer,
    /// One of the story's character names, or empty for narration.
    Speaker,
    Emotion,
    /// One of the story's background names, or the keep-current sentinel.
    Background,
    /// One of the story's declared fields.
    Field,
    SetMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
}

const fn prop(name: &'static str, kind: PropertyKind) -> PropertyDescriptor {
    PropertyDescriptor { name, kind }
}

const DIALOGUE_PROPERTIES: &[PropertyDescriptor] = &[
    prop("speaker", PropertyKind::Speaker),
    prop("emotion", PropertyKind::Emotion),
    prop("text", PropertyKind::Text),
    prop("background", PropertyKind::Background),
];

const SETTER_PROPERTIES: &[PropertyDescriptor] = &[
    prop("field", PropertyKind::Field),
    prop("value", PropertyKind::Integer),
    prop("mode", PropertyKind::SetMode),
];

impl NodeType {
    /// Properties an author can edit on this node type. Choices are edited
    /// separately as edges.
    pub fn editable_properties(&self) -> &'static [PropertyDescriptor] {
        match self {
            NodeType::Dialogue => DIALOGUE_PROPERTIES,
            NodeType::Setter => SETTER_PROPERTIES,
            NodeType::Switch => &[],
        }
    }
}

/// A value written into a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

/// Option lists for the choice-style property kinds, given the story tables.
pub fn property_options(
    kind: PropertyKind,
    characters: &[&str],
    backgrounds: &[&str],
    fields: &[&str],
) -> Vec<String> {
    match kind {
        PropertyKind::Speaker => characters
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(String::new()))
            .collect(),
        PropertyKind::Background => backgrounds
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(KEEP_BACKGROUND.to_string()))
            .collect(),
        PropertyKind::Field => fields.iter().map(|s| s.to_string()).collect(),
        PropertyKind::Emotion => Emotion::ALL.iter().map(|e| e.name().to_string()).collect(),
        PropertyKind::SetMode => SetMode::ALL.iter().map(|m| m.name().to_string()).collect(),
        PropertyKind::Text | PropertyKind::Integer => Vec::new(),
    }
}

/// Write a property on a node payload. Returns a reason on failure.
pub fn set_property(kind: &mut NodeKind, name: &str, value: PropertyValue) -> Result<(), String> {
    let type_name = kind.type_name().to_string();
    let descriptor = kind
        .node_type()
        .and_then(|t| t.editable_properties().iter().find(|p| p.name == name))
        .ok_or_else(|| format!("{} nodes have no property '{}'", type_name, name))?;

    match (kind, descriptor.kind, value) {
        (NodeKind::Dialogue(d), PropertyKind::Speaker, PropertyValue::Text(v)) => d.speaker = v,
        (NodeKind::Dialogue(d), PropertyKind::Text, PropertyValue::Text(v)) => d.text = v,
        (NodeKind::Dialogue(d), PropertyKind::Background, PropertyValue::Text(v)) => {
            d.background = v
        }
        (NodeKind::Dialogue(d), PropertyKind::Emotion, PropertyValue::Text(v)) => {
            d.emotion = Emotion::from_name(&v).ok_or_else(|| format!("unknown emotion '{}'", v))?
        }
        (NodeKind::Setter(s), PropertyKind::Field, PropertyValue::Text(v)) => s.field = v,
        (NodeKind::Setter(s), PropertyKind::Integer, PropertyValue::Integer(v)) => s.value = v,
        (NodeKind::Setter(s), PropertyKind::SetMode, PropertyValue::Text(v)) => {
            s.mode = SetMode::from_name(&v).ok_or_else(|| format!("unknown mode '{}'", v))?
        }
        (_, expected, got) => {
            return Err(format!("expected {:?} value, got {:?}", expected, got));
        }
    }
    Ok(())
}
