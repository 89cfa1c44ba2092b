//! WASM bindings for dialogue-engine: a browser player driven by JSON frames.

use wasm_bindgen::prelude::*;

use dialogue_engine::core::engine::{DialogueEngine, EngineState};
use dialogue_engine::core::graph::StoryGraph;
use dialogue_engine::core::lint::lint;
use dialogue_engine::core::session::SessionState;
use dialogue_engine::core::surface::{RecordingSurface, SurfaceEvent};
use dialogue_engine::schema::node::NodeId;
use dialogue_engine::schema::story::StoryData;

// ---------------------------------------------------------------------------
// Embedded demo story, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const HARBOR_STORY: &str = include_str!("../../story_data/harbor/story.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------

/// Everything the page needs after one turn.
#[derive(serde::Serialize)]
struct Turn {
    events: Vec<SurfaceEvent>,
    state: &'static str,
    node: Option<u32>,
    warnings: Vec<String>,
}

fn state_info(state: &EngineState) -> (&'static str, Option<u32>) {
    match state {
        EngineState::Idle => ("idle", None),
        EngineState::AwaitingChoice(node) => ("awaiting_choice", Some(node.0)),
        EngineState::Finished(node) => ("finished", Some(node.0)),
        EngineState::Broken(fault) => ("broken", Some(fault.node().0)),
    }
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

// ---------------------------------------------------------------------------
// WebPlayer, the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct WebPlayer {
    engine: DialogueEngine,
}

#[wasm_bindgen]
impl WebPlayer {
    /// Create a player for a RON story.
    #[wasm_bindgen(constructor)]
    pub fn new(story_ron: &str) -> Result<WebPlayer, JsError> {
        let graph = StoryData::parse_ron(story_ron)
            .and_then(StoryGraph::from_story)
            .map_err(|e| js_err("Story parse error", e))?;
        let engine = DialogueEngine::builder()
            .with_story(graph)
            .build()
            .map_err(|e| js_err("Engine build error", e))?;
        Ok(WebPlayer { engine })
    }

    /// Player for the bundled harbor demo.
    pub fn demo() -> Result<WebPlayer, JsError> {
        WebPlayer::new(data::HARBOR_STORY)
    }

    /// Run from the current node. Returns a JSON turn.
    pub fn start(&mut self) -> Result<String, JsError> {
        let mut surface = RecordingSurface::new();
        self.engine.start(&mut surface);
        self.turn(surface)
    }

    /// Pick option `index` (0-based). Returns a JSON turn.
    pub fn choose(&mut self, index: usize) -> Result<String, JsError> {
        let mut surface = RecordingSurface::new();
        self.engine
            .choose(index, &mut surface)
            .map_err(|e| js_err("Choice error", e))?;
        self.turn(surface)
    }

    /// Continue from an arbitrary node. Returns a JSON turn.
    pub fn jump_to(&mut self, node: u32) -> Result<String, JsError> {
        let mut surface = RecordingSurface::new();
        self.engine.jump_to(NodeId(node), &mut surface);
        self.turn(surface)
    }

    /// Session JSON, in the same shape as the save file.
    pub fn snapshot(&self) -> Result<String, JsError> {
        self.engine
            .snapshot()
            .to_json()
            .map_err(|e| js_err("Serialization error", e))
    }

    /// Replace the session with a saved one. Call `start` afterwards to
    /// re-present the saved node.
    pub fn restore(&mut self, session_json: &str) -> Result<(), JsError> {
        let session =
            SessionState::from_json(session_json).map_err(|e| js_err("Invalid session JSON", e))?;
        let graph = self.engine.graph().clone();
        self.engine = DialogueEngine::builder()
            .with_story(graph)
            .with_session(session)
            .build()
            .map_err(|e| js_err("Engine build error", e))?;
        Ok(())
    }

    /// Lint findings for the loaded story as a JSON array.
    pub fn lint(&self) -> Result<String, JsError> {
        let report: Vec<String> = lint(self.engine.graph())
            .iter()
            .map(|issue| issue.to_string())
            .collect();
        serde_json::to_string(&report).map_err(|e| js_err("Serialization error", e))
    }
}

impl WebPlayer {
    fn turn(&mut self, surface: RecordingSurface) -> Result<String, JsError> {
        let (state, node) = state_info(self.engine.state());
        let turn = Turn {
            events: surface.events,
            state,
            node,
            warnings: self
                .engine
                .take_warnings()
                .iter()
                .map(|w| w.to_string())
                .collect(),
        };
        serde_json::to_string(&turn).map_err(|e| js_err("Serialization error", e))
    }
}
