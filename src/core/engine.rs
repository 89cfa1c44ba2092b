/// The runtime state machine: walks the story graph from the session's
/// current node, applying Setter and Switch nodes synchronously and
/// suspending on Dialogue nodes until the host reports a choice.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::graph::StoryGraph;
use crate::core::session::{SessionError, SessionState};
use crate::core::surface::{ChoiceOption, DialogueFrame, PresentationSurface};
use crate::core::variables::{VariableError, VariableStore};
use crate::schema::condition::{Condition, ConditionError};
use crate::schema::node::{Choice, DialogueNode, NodeId, NodeKind, SetMode, SetterNode, SwitchNode};
use crate::schema::story::{StoryData, StoryError, KEEP_BACKGROUND};

/// Upper bound on Setter/Switch transitions within one turn.
pub const DEFAULT_MAX_CHAIN_STEPS: usize = 10_000;

/// Author-content problems. Logged, collected, and never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentWarning {
    #[error("node {node}: unknown field '{field}'")]
    UnknownField { node: NodeId, field: String },
    #[error("node {node}: unknown character '{name}'")]
    UnknownCharacter { node: NodeId, name: String },
    #[error("node {node}: unknown background '{name}'")]
    UnknownBackground { node: NodeId, name: String },
    #[error("node {node}: choice {index} has malformed condition '{label}': {reason}")]
    MalformedSwitchCondition {
        node: NodeId,
        index: usize,
        label: String,
        reason: ConditionError,
    },
    #[error("node {node}: no switch condition matched")]
    NoMatch { node: NodeId },
}

/// Problems that stop execution: the graph cannot be followed any further.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("setter node {node} has no continuation")]
    MissingContinuation { node: NodeId },
    #[error("node {node} has unknown type '{type_name}'")]
    UnknownNodeType { node: NodeId, type_name: String },
    #[error("node {node} does not exist")]
    MissingNode { node: NodeId },
    #[error("choice {index} of node {node} points nowhere")]
    UnresolvedChoice { node: NodeId, index: usize },
    #[error("gave up after {steps} automatic transitions, last at node {node}")]
    RunawayChain { node: NodeId, steps: usize },
}

impl ContentWarning {
    pub fn node(&self) -> NodeId {
        match self {
            ContentWarning::UnknownField { node, .. }
            | ContentWarning::UnknownCharacter { node, .. }
            | ContentWarning::UnknownBackground { node, .. }
            | ContentWarning::MalformedSwitchCondition { node, .. }
            | ContentWarning::NoMatch { node } => *node,
        }
    }
}

impl Fault {
    /// The node the fault was detected on.
    pub fn node(&self) -> NodeId {
        match self {
            Fault::MissingContinuation { node }
            | Fault::UnknownNodeType { node, .. }
            | Fault::MissingNode { node }
            | Fault::UnresolvedChoice { node, .. }
            | Fault::RunawayChain { node, .. } => *node,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("story error: {0}")]
    Story(#[from] StoryError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("not waiting for a choice")]
    NotAwaitingChoice,
    #[error("choice index {index} out of range ({len} choices)")]
    ChoiceOutOfRange { index: usize, len: usize },
}

/// Where the engine is between turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Not started yet.
    Idle,
    /// A Dialogue node is on screen with options; call `choose`.
    AwaitingChoice(NodeId),
    /// Reached a terminal node.
    Finished(NodeId),
    /// Halted on a broken graph.
    Broken(Fault),
}

/// What is currently on screen, carried between Dialogue nodes so that
/// unresolved names keep the previous picture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Stage {
    portrait: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Default)]
struct Diagnostics {
    warnings: Vec<ContentWarning>,
}

impl Diagnostics {
    fn warn(&mut self, warning: ContentWarning) {
        tracing::warn!(node = %warning.node(), "{}", warning);
        self.warnings.push(warning);
    }
}

enum Step {
    Continue(NodeId),
    Suspend,
    End,
    Halt(Fault),
}

/// The dialogue runtime. Built via `DialogueEngine::builder()`.
pub struct DialogueEngine {
    graph: StoryGraph,
    variables: VariableStore,
    current: NodeId,
    state: EngineState,
    stage: Stage,
    diagnostics: Diagnostics,
    max_chain_steps: usize,
}

/// Builder for constructing a `DialogueEngine`.
pub struct DialogueEngineBuilder {
    story_path: Option<PathBuf>,
    /// Directly provided graph (for testing without files).
    story: Option<StoryGraph>,
    session: Option<SessionState>,
    max_chain_steps: usize,
}

impl DialogueEngine {
    pub fn builder() -> DialogueEngineBuilder {
        DialogueEngineBuilder {
            story_path: None,
            story: None,
            session: None,
            max_chain_steps: DEFAULT_MAX_CHAIN_STEPS,
        }
    }

    /// Run from the current node until the next suspension point.
    ///
    /// Starting a session restored from a save re-presents the node it was
    /// saved on.
    pub fn start(&mut self, surface: &mut dyn PresentationSurface) -> &EngineState {
        self.run_from(self.current, surface);
        &self.state
    }

    /// Report the option the player selected and run to the next suspension
    /// point.
    pub fn choose(
        &mut self,
        index: usize,
        surface: &mut dyn PresentationSurface,
    ) -> Result<&EngineState, EngineError> {
        let EngineState::AwaitingChoice(node) = &self.state else {
            return Err(EngineError::NotAwaitingChoice);
        };
        let node = *node;
        let choices = self
            .graph
            .node(node)
            .map(|n| n.choices())
            .unwrap_or_default();
        let target = choices
            .get(index)
            .ok_or(EngineError::ChoiceOutOfRange {
                index,
                len: choices.len(),
            })?
            .target;

        tracing::debug!(node = %node, index, "choice selected");
        surface.clear_choices();
        match target {
            Some(target) => self.run_from(target, surface),
            None => self.halt(Fault::UnresolvedChoice { node, index }, surface),
        }
        Ok(&self.state)
    }

    /// Jump straight to a node, whatever state the engine is in. Used by
    /// authoring tools to inspect arbitrary points of the story.
    pub fn jump_to(&mut self, node: NodeId, surface: &mut dyn PresentationSurface) -> &EngineState {
        tracing::info!(node = %node, "jumping to node");
        surface.clear_choices();
        self.run_from(node, surface);
        &self.state
    }

    /// Swap in an updated graph (e.g. after an editing session commits).
    /// Values of fields the new graph still declares are kept, new fields
    /// start at 0 and dropped fields are removed. The engine goes idle at the
    /// current node.
    pub fn replace_story(&mut self, graph: StoryGraph) {
        self.variables = VariableStore::restore(graph.fields(), &self.variables.snapshot());
        self.graph = graph;
        self.state = EngineState::Idle;
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn current_node(&self) -> NodeId {
        self.current
    }

    pub fn graph(&self) -> &StoryGraph {
        &self.graph
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// The options of the node awaiting input, if any.
    pub fn pending_choices(&self) -> Vec<ChoiceOption> {
        match &self.state {
            EngineState::AwaitingChoice(node) => self
                .graph
                .node(*node)
                .map(|n| options(n.choices()))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Momentary snapshot of the session, safe to save between turns.
    pub fn snapshot(&self) -> SessionState {
        SessionState {
            current_node_id: self.current,
            fields: self.variables.snapshot(),
        }
    }

    /// Content warnings collected since the last call.
    pub fn take_warnings(&mut self) -> Vec<ContentWarning> {
        std::mem::take(&mut self.diagnostics.warnings)
    }

    fn run_from(&mut self, start: NodeId, surface: &mut dyn PresentationSurface) {
        let mut id = start;
        for _ in 0..self.max_chain_steps {
            match self.step(id, surface) {
                Step::Continue(next) => {
                    tracing::debug!(from = %id, to = %next, "transition");
                    id = next;
                }
                Step::Suspend => {
                    self.state = EngineState::AwaitingChoice(id);
                    return;
                }
                Step::End => {
                    tracing::info!(node = %id, "end of story");
                    self.state = EngineState::Finished(id);
                    surface.story_ended(id);
                    return;
                }
                Step::Halt(fault) => {
                    self.halt(fault, surface);
                    return;
                }
            }
        }
        let fault = Fault::RunawayChain {
            node: id,
            steps: self.max_chain_steps,
        };
        self.halt(fault, surface);
    }

    fn halt(&mut self, fault: Fault, surface: &mut dyn PresentationSurface) {
        tracing::error!(node = %fault.node(), "story broken: {}", fault);
        surface.story_broken(&fault);
        self.state = EngineState::Broken(fault);
    }

    /// Enter a node and evaluate it.
    fn step(&mut self, id: NodeId, surface: &mut dyn PresentationSurface) -> Step {
        // Entering comes first so a save taken mid-evaluation points here.
        self.current = id;

        let Self {
            graph,
            variables,
            stage,
            diagnostics,
            ..
        } = self;
        let Some(node) = graph.node(id) else {
            return Step::Halt(Fault::MissingNode { node: id });
        };

        match &node.kind {
            NodeKind::Dialogue(dialogue) => {
                present_dialogue(graph, stage, diagnostics, id, dialogue, surface)
            }
            NodeKind::Setter(setter) => apply_setter(variables, diagnostics, id, setter),
            NodeKind::Switch(switch) => evaluate_switch(variables, diagnostics, id, switch),
            NodeKind::Unknown { type_name, .. } => Step::Halt(Fault::UnknownNodeType {
                node: id,
                type_name: type_name.clone(),
            }),
        }
    }
}

fn options(choices: &[Choice]) -> Vec<ChoiceOption> {
    choices
        .iter()
        .enumerate()
        .map(|(index, choice)| ChoiceOption {
            index,
            label: choice.label.clone(),
        })
        .collect()
}

fn follow(node: NodeId, index: usize, choice: &Choice) -> Step {
    match choice.target {
        Some(target) => Step::Continue(target),
        None => Step::Halt(Fault::UnresolvedChoice { node, index }),
    }
}

fn present_dialogue(
    graph: &StoryGraph,
    stage: &mut Stage,
    diagnostics: &mut Diagnostics,
    id: NodeId,
    dialogue: &DialogueNode,
    surface: &mut dyn PresentationSurface,
) -> Step {
    if dialogue.speaker.is_empty() {
        stage.portrait = None;
    } else {
        match graph.character(&dialogue.speaker) {
            Some(character) => {
                stage.portrait = Some(character.portrait_for(dialogue.emotion).to_string());
            }
            None => diagnostics.warn(ContentWarning::UnknownCharacter {
                node: id,
                name: dialogue.speaker.clone(),
            }),
        }
    }

    let background = dialogue.background.as_str();
    if !background.is_empty() && background != KEEP_BACKGROUND {
        match graph.background(background) {
            Some(bg) => stage.background = Some(bg.image.clone()),
            None => diagnostics.warn(ContentWarning::UnknownBackground {
                node: id,
                name: background.to_string(),
            }),
        }
    }

    surface.show_dialogue(&DialogueFrame {
        node: id,
        speaker: dialogue.speaker.clone(),
        portrait: stage.portrait.clone(),
        background: stage.background.clone(),
        text: dialogue.text.clone(),
    });
    surface.clear_choices();

    if dialogue.choices.is_empty() {
        return Step::End;
    }
    surface.show_choices(&options(&dialogue.choices));
    Step::Suspend
}

fn apply_setter(
    variables: &mut VariableStore,
    diagnostics: &mut Diagnostics,
    id: NodeId,
    setter: &SetterNode,
) -> Step {
    let result = match setter.mode {
        SetMode::Set => variables.set(&setter.field, setter.value),
        SetMode::Add => variables.add(&setter.field, setter.value),
    };
    if let Err(VariableError::UnknownField(field)) = result {
        diagnostics.warn(ContentWarning::UnknownField { node: id, field });
    }

    match setter.continuation() {
        Some(Choice {
            target: Some(target),
            ..
        }) => Step::Continue(*target),
        _ => Step::Halt(Fault::MissingContinuation { node: id }),
    }
}

/// First choice, in list order, whose condition holds wins. Malformed
/// choices are skipped. With no match the first choice is followed anyway.
fn evaluate_switch(
    variables: &VariableStore,
    diagnostics: &mut Diagnostics,
    id: NodeId,
    switch: &SwitchNode,
) -> Step {
    for (index, choice) in switch.choices.iter().enumerate() {
        let malformed = |reason| ContentWarning::MalformedSwitchCondition {
            node: id,
            index,
            label: choice.label.clone(),
            reason,
        };

        let condition = match Condition::parse(&choice.label) {
            Ok(condition) => condition,
            Err(reason) => {
                diagnostics.warn(malformed(reason));
                continue;
            }
        };

        let stored = if condition.operator.reads_field() {
            match variables.get(&condition.field) {
                Some(value) => value,
                None => {
                    diagnostics.warn(malformed(ConditionError::UnknownField(condition.field)));
                    continue;
                }
            }
        } else {
            0
        };

        if condition.operator.holds(stored, condition.value) {
            return follow(id, index, choice);
        }
    }

    diagnostics.warn(ContentWarning::NoMatch { node: id });
    match switch.choices.first() {
        Some(first) => follow(id, 0, first),
        None => Step::End,
    }
}

impl DialogueEngineBuilder {
    /// Load the story from a RON file.
    pub fn story_path(mut self, path: impl AsRef<Path>) -> Self {
        self.story_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Provide the graph directly (for testing without files).
    pub fn with_story(mut self, graph: StoryGraph) -> Self {
        self.story = Some(graph);
        self
    }

    /// Resume from a saved session instead of starting at node 0.
    pub fn with_session(mut self, session: SessionState) -> Self {
        self.session = Some(session);
        self
    }

    pub fn max_chain_steps(mut self, steps: usize) -> Self {
        self.max_chain_steps = steps.max(1);
        self
    }

    pub fn build(self) -> Result<DialogueEngine, EngineError> {
        let graph = match (self.story, self.story_path) {
            (Some(graph), _) => graph,
            (None, Some(path)) => StoryGraph::from_story(StoryData::load_from_ron(&path)?)?,
            (None, None) => StoryGraph::new(),
        };

        let (variables, current) = match self.session {
            Some(session) => (
                VariableStore::restore(graph.fields(), &session.fields),
                session.current_node_id,
            ),
            None => (VariableStore::from_schema(graph.fields()), NodeId::ENTRY),
        };

        Ok(DialogueEngine {
            graph,
            variables,
            current,
            state: EngineState::Idle,
            stage: Stage::default(),
            diagnostics: Diagnostics::default(),
            max_chain_steps: self.max_chain_steps,
        })
    }
}
