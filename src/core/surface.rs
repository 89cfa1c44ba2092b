/// Presentation surface: the contract the engine calls into to put a line,
/// its portrait, the background and the options on screen.

use serde::Serialize;

use crate::core::engine::Fault;
use crate::schema::node::NodeId;

/// Everything needed to draw one Dialogue node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueFrame {
    pub node: NodeId,
    pub speaker: String,
    /// Portrait currently shown. Unchanged from the previous frame when the
    /// speaker could not be resolved; `None` for narration.
    pub portrait: Option<String>,
    /// Background image currently shown.
    pub background: Option<String>,
    pub text: String,
}

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub index: usize,
    pub label: String,
}

/// Implemented by whatever renders the story.
///
/// Choosing is asynchronous from the engine's point of view: after
/// `show_choices` the engine waits until the host calls
/// `DialogueEngine::choose` with the selected index.
pub trait PresentationSurface {
    fn show_dialogue(&mut self, frame: &DialogueFrame);

    fn show_choices(&mut self, choices: &[ChoiceOption]);

    fn clear_choices(&mut self);

    /// The story reached a Dialogue node with no choices.
    fn story_ended(&mut self, _node: NodeId) {}

    /// Execution halted on a broken graph.
    fn story_broken(&mut self, _fault: &Fault) {}
}

/// Something the engine asked a surface to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SurfaceEvent {
    Dialogue(DialogueFrame),
    Choices { choices: Vec<ChoiceOption> },
    ClearChoices,
    Ended { node: NodeId },
    Broken { message: String },
}

/// A surface that records every call, for tests and headless hosts.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub events: Vec<SurfaceEvent>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent dialogue frame shown.
    pub fn last_frame(&self) -> Option<&DialogueFrame> {
        self.events.iter().rev().find_map(|e| match e {
            SurfaceEvent::Dialogue(frame) => Some(frame),
            _ => None,
        })
    }

    /// The options currently offered, if the last thing shown was a list of
    /// choices that has not been cleared since.
    pub fn pending_choices(&self) -> Option<&[ChoiceOption]> {
        for event in self.events.iter().rev() {
            match event {
                SurfaceEvent::Choices { choices } => return Some(choices),
                SurfaceEvent::ClearChoices => return None,
                _ => {}
            }
        }
        None
    }

    pub fn frames(&self) -> impl Iterator<Item = &DialogueFrame> {
        self.events.iter().filter_map(|e| match e {
            SurfaceEvent::Dialogue(frame) => Some(frame),
            _ => None,
        })
    }

    /// Take the recorded events, leaving the surface empty.
    pub fn drain(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl PresentationSurface for RecordingSurface {
    fn show_dialogue(&mut self, frame: &DialogueFrame) {
        self.events.push(SurfaceEvent::Dialogue(frame.clone()));
    }

    fn show_choices(&mut self, choices: &[ChoiceOption]) {
        self.events.push(SurfaceEvent::Choices {
            choices: choices.to_vec(),
        });
    }

    fn clear_choices(&mut self) {
        self.events.push(SurfaceEvent::ClearChoices);
    }

    fn story_ended(&mut self, node: NodeId) {
        self.events.push(SurfaceEvent::Ended { node });
    }

    fn story_broken(&mut self, fault: &Fault) {
        self.events.push(SurfaceEvent::Broken {
            message: fault.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> DialogueFrame {
        DialogueFrame {
            node: NodeId(0),
            speaker: String::new(),
            portrait: None,
            background: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn pending_choices_reset_by_clear() {
        let mut surface = RecordingSurface::new();
        surface.show_dialogue(&frame("hi"));
        surface.show_choices(&[ChoiceOption {
            index: 0,
            label: "ok".to_string(),
        }]);
        assert_eq!(surface.pending_choices().map(|c| c.len()), Some(1));
        surface.clear_choices();
        assert!(surface.pending_choices().is_none());
    }

    #[test]
    fn last_frame_and_drain() {
        let mut surface = RecordingSurface::new();
        surface.show_dialogue(&frame("one"));
        surface.show_dialogue(&frame("two"));
        assert_eq!(surface.last_frame().map(|f| f.text.as_str()), Some("two"));
        assert_eq!(surface.frames().count(), 2);
        assert_eq!(surface.drain().len(), 2);
        assert!(surface.last_frame().is_none());
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_string(&SurfaceEvent::Ended { node: NodeId(4) }).unwrap();
        assert_eq!(json, r#"{"event":"ended","node":4}"#);
    }
}
