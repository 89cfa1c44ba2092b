/// Session persistence: the current node plus field values, saved as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::engine::DialogueEngine;
use crate::schema::node::NodeId;

/// File name of the save inside the application's storage directory.
pub const SAVE_FILE_NAME: &str = "GameData.json";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The persisted pointer into the graph and a snapshot of the fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_node_id: NodeId,
    #[serde(default)]
    pub fields: BTreeMap<String, i64>,
}

impl SessionState {
    /// A fresh session at the entry node with no fields; the engine seeds
    /// them from the story schema.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<SessionState, SessionError> {
        Ok(serde_json::from_str(input)?)
    }
}

/// Where sessions are loaded from and saved to.
pub trait SessionStore {
    /// The saved session, or a fresh one when nothing was saved yet.
    fn load(&self) -> Result<SessionState, SessionError>;

    /// Overwrite the saved session.
    fn save(&self, session: &SessionState) -> Result<(), SessionError>;
}

/// Saves to `GameData.json` inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SAVE_FILE_NAME)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<SessionState, SessionError> {
        let path = self.path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no save found; starting a new session");
            return Ok(SessionState::new());
        }
        let contents = std::fs::read_to_string(&path)?;
        let session = SessionState::from_json(&contents)?;
        tracing::info!(path = %path.display(), node = %session.current_node_id, "session loaded");
        Ok(session)
    }

    fn save(&self, session: &SessionState) -> Result<(), SessionError> {
        let path = self.path();
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, session.to_json()?)?;
        tracing::debug!(path = %path.display(), node = %session.current_node_id, "session saved");
        Ok(())
    }
}

/// Development session: the state is supplied by the authoring tool and
/// saving is disabled.
#[derive(Debug, Clone, Default)]
pub struct DevSessionStore {
    state: SessionState,
}

impl DevSessionStore {
    pub fn new(state: SessionState) -> Self {
        Self { state }
    }

    /// Map a positional list of values onto the schema fields. Fields without
    /// a value get 0; surplus values are ignored.
    pub fn from_values<S: AsRef<str>>(node: NodeId, values: &[i64], fields: &[S]) -> Self {
        let fields = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.as_ref().to_string(), values.get(i).copied().unwrap_or(0)))
            .collect();
        Self {
            state: SessionState {
                current_node_id: node,
                fields,
            },
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn set_current_node(&mut self, node: NodeId) {
        self.state.current_node_id = node;
    }

    pub fn set_field(&mut self, field: &str, value: i64) {
        self.state.fields.insert(field.to_string(), value);
    }
}

impl SessionStore for DevSessionStore {
    fn load(&self) -> Result<SessionState, SessionError> {
        Ok(self.state.clone())
    }

    fn save(&self, _session: &SessionState) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Periodic save driven by the host's clock.
#[derive(Debug, Clone)]
pub struct Autosave {
    interval: Duration,
    last: Option<Instant>,
}

impl Autosave {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a save is due at `now`. The first tick only starts the clock.
    pub fn due(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => false,
        }
    }

    /// Save the engine's snapshot if the interval elapsed. A failed save is
    /// logged and tried again on the next tick. Returns whether a save
    /// succeeded.
    pub fn tick(&mut self, now: Instant, engine: &DialogueEngine, store: &dyn SessionStore) -> bool {
        if self.last.is_none() {
            self.last = Some(now);
            return false;
        }
        if !self.due(now) {
            return false;
        }
        match store.save(&engine.snapshot()) {
            Ok(()) => {
                self.last = Some(now);
                true
            }
            Err(e) => {
                tracing::error!("autosave failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::StoryGraph;

    fn sample_state() -> SessionState {
        SessionState {
            current_node_id: NodeId(17),
            fields: BTreeMap::from([("hp".to_string(), -4), ("gold".to_string(), 250)]),
        }
    }

    #[test]
    fn fresh_session_starts_at_entry() {
        let state = SessionState::default();
        assert_eq!(state.current_node_id, NodeId::ENTRY);
        assert!(state.fields.is_empty());
        assert_eq!(SessionState::new(), state);
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(sample_state()).unwrap();
        assert_eq!(json["currentNodeId"], 17);
        assert_eq!(json["fields"]["gold"], 250);
    }

    #[test]
    fn json_round_trip() {
        let state = sample_state();
        assert_eq!(SessionState::from_json(&state.to_json().unwrap()).unwrap(), state);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&sample_state()).unwrap();
        assert!(dir.path().join(SAVE_FILE_NAME).exists());
        assert_eq!(store.load().unwrap(), sample_state());
    }

    #[test]
    fn file_store_without_save_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let state = store.load().unwrap();
        assert_eq!(state.current_node_id, NodeId(0));
        assert!(state.fields.is_empty());
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&sample_state()).unwrap();
        let newer = SessionState {
            current_node_id: NodeId(2),
            fields: BTreeMap::new(),
        };
        store.save(&newer).unwrap();
        assert_eq!(store.load().unwrap(), newer);
    }

    #[test]
    fn corrupt_save_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SAVE_FILE_NAME), "{not json").unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(matches!(store.load(), Err(SessionError::Json(_))));
    }

    #[test]
    fn dev_store_maps_values_and_never_saves() {
        let store = DevSessionStore::from_values(NodeId(5), &[3], &["hp", "gold"]);
        let state = store.load().unwrap();
        assert_eq!(state.current_node_id, NodeId(5));
        assert_eq!(state.fields["hp"], 3);
        assert_eq!(state.fields["gold"], 0);

        store.save(&sample_state()).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn autosave_waits_for_interval() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let engine = DialogueEngine::builder()
            .with_story(StoryGraph::new())
            .build()
            .unwrap();
        let mut autosave = Autosave::new(Duration::from_secs(30));
        let t0 = Instant::now();

        assert!(!autosave.tick(t0, &engine, &store));
        assert!(!autosave.tick(t0 + Duration::from_secs(10), &engine, &store));
        assert!(!store.path().exists());
        assert!(autosave.tick(t0 + Duration::from_secs(31), &engine, &store));
        assert!(store.path().exists());
        assert!(!autosave.due(t0 + Duration::from_secs(40)));
    }

    #[test]
    fn autosave_failure_retries_next_tick() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        // A directory path that runs through a regular file cannot be created.
        let store = FileSessionStore::new(blocker.join("saves"));
        let engine = DialogueEngine::builder().build().unwrap();
        let mut autosave = Autosave::new(Duration::from_secs(1));
        let t0 = Instant::now();

        autosave.tick(t0, &engine, &store);
        assert!(!autosave.tick(t0 + Duration::from_secs(2), &engine, &store));
        assert!(autosave.due(t0 + Duration::from_secs(2)));
    }
}
