/// Authored story data (characters, backgrounds, fields, nodes) and its RON
/// on-disk format.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::node::{
    Choice, DialogueNode, Emotion, Node, NodeId, NodeKind, NodeType, Position, SetMode,
    SetterNode, SwitchNode,
};

/// Background name meaning "do not change the currently displayed background".
pub const KEEP_BACKGROUND: &str = "<same>";

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonWrite(#[from] ron::Error),
    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),
}

/// A speaker with a portrait per emotion. Only the normal portrait is
/// required; the others fall back to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub portrait: String,
    #[serde(default)]
    pub happy: Option<String>,
    #[serde(default)]
    pub sad: Option<String>,
    #[serde(default)]
    pub angry: Option<String>,
}

impl Character {
    pub fn new(name: impl Into<String>, portrait: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            portrait: portrait.into(),
            ..Default::default()
        }
    }

    /// Portrait for an emotion, falling back to the normal one.
    pub fn portrait_for(&self, emotion: Emotion) -> &str {
        let specific = match emotion {
            Emotion::Normal => None,
            Emotion::Happy => self.happy.as_deref(),
            Emotion::Sad => self.sad.as_deref(),
            Emotion::Angry => self.angry.as_deref(),
        };
        specific.unwrap_or(&self.portrait)
    }
}

/// A named background image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Background {
    pub name: String,
    pub image: String,
}

impl Background {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }
}

/// The full authored story: lookup tables plus the node list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoryData {
    pub characters: Vec<Character>,
    pub backgrounds: Vec<Background>,
    pub fields: Vec<String>,
    pub nodes: Vec<Node>,
}

// RON deserialization helpers. On disk every node is one flat record with a
// string type tag.

fn unresolved_target() -> i64 {
    -1
}

#[derive(Debug, Serialize, Deserialize)]
struct RonChoice {
    #[serde(default, alias = "text")]
    label: String,
    #[serde(default = "unresolved_target", alias = "next")]
    target: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Node")]
struct RonNode {
    id: u32,
    #[serde(rename = "type", default = "default_type_name")]
    type_name: String,
    #[serde(default)]
    position: (f32, f32),
    #[serde(default, alias = "character", skip_serializing_if = "String::is_empty")]
    speaker: String,
    #[serde(default)]
    emotion: Emotion,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    background: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    field: String,
    #[serde(default)]
    value: i64,
    #[serde(default)]
    mode: SetMode,
    #[serde(default)]
    choices: Vec<RonChoice>,
}

fn default_type_name() -> String {
    NodeType::Dialogue.name().to_string()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Story")]
struct RonStory {
    #[serde(default)]
    characters: Vec<Character>,
    #[serde(default, alias = "background_images")]
    backgrounds: Vec<Background>,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default, alias = "dialogues")]
    nodes: Vec<RonNode>,
}

impl From<RonChoice> for Choice {
    fn from(raw: RonChoice) -> Self {
        let target = u32::try_from(raw.target).ok().map(NodeId);
        Choice {
            label: raw.label,
            target,
        }
    }
}

impl From<&Choice> for RonChoice {
    fn from(choice: &Choice) -> Self {
        RonChoice {
            label: choice.label.clone(),
            target: choice.target.map_or(-1, |id| i64::from(id.0)),
        }
    }
}

impl From<RonNode> for Node {
    fn from(raw: RonNode) -> Self {
        let choices: Vec<Choice> = raw.choices.into_iter().map(Choice::from).collect();
        let kind = match NodeType::from_name(&raw.type_name) {
            Some(NodeType::Dialogue) => NodeKind::Dialogue(DialogueNode {
                speaker: raw.speaker,
                emotion: raw.emotion,
                text: raw.text,
                background: raw.background,
                choices,
            }),
            Some(NodeType::Setter) => NodeKind::Setter(SetterNode {
                field: raw.field,
                value: raw.value,
                mode: raw.mode,
                choices,
            }),
            Some(NodeType::Switch) => NodeKind::Switch(SwitchNode { choices }),
            None => NodeKind::Unknown {
                type_name: raw.type_name,
                choices,
            },
        };
        Node {
            id: NodeId(raw.id),
            position: Position::new(raw.position.0, raw.position.1),
            kind,
        }
    }
}

impl From<&Node> for RonNode {
    fn from(node: &Node) -> Self {
        let mut raw = RonNode {
            id: node.id.0,
            type_name: node.kind.type_name().to_string(),
            position: (node.position.x, node.position.y),
            speaker: String::new(),
            emotion: Emotion::Normal,
            text: String::new(),
            background: String::new(),
            field: String::new(),
            value: 0,
            mode: SetMode::Set,
            choices: node.choices().iter().map(RonChoice::from).collect(),
        };
        match &node.kind {
            NodeKind::Dialogue(d) => {
                raw.speaker = d.speaker.clone();
                raw.emotion = d.emotion;
                raw.text = d.text.clone();
                raw.background = d.background.clone();
            }
            NodeKind::Setter(s) => {
                raw.field = s.field.clone();
                raw.value = s.value;
                raw.mode = s.mode;
            }
            NodeKind::Switch(_) | NodeKind::Unknown { .. } => {}
        }
        raw
    }
}

impl StoryData {
    /// Load story data from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StoryData, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse story data from a RON string.
    pub fn parse_ron(input: &str) -> Result<StoryData, StoryError> {
        let raw: RonStory = ron::from_str(input)?;
        Ok(StoryData {
            characters: raw.characters,
            backgrounds: raw.backgrounds,
            fields: raw.fields,
            nodes: raw.nodes.into_iter().map(Node::from).collect(),
        })
    }

    /// Serialize to pretty RON in the on-disk shape.
    pub fn to_ron(&self) -> Result<String, StoryError> {
        let raw = RonStory {
            characters: self.characters.clone(),
            backgrounds: self.backgrounds.clone(),
            fields: self.fields.clone(),
            nodes: self.nodes.iter().map(RonNode::from).collect(),
        };
        Ok(ron::ser::to_string_pretty(
            &raw,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Write to a RON file, replacing any existing content.
    pub fn save_to_ron(&self, path: &Path) -> Result<(), StoryError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
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
}
