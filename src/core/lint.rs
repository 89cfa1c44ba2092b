/// Static checks over a story graph: orphans, dangling edges, and the
/// author-content problems the engine would otherwise only report at runtime.

use serde::Serialize;
use std::fmt;

use crate::core::graph::StoryGraph;
use crate::schema::condition::{Condition, ConditionError};
use crate::schema::node::{NodeId, NodeKind};
use crate::schema::story::KEEP_BACKGROUND;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Finding {
    /// Not reachable from the entry node.
    Orphan,
    UnresolvedChoice { index: usize },
    /// A Setter without exactly one resolved continuation.
    MissingContinuation,
    UnknownField { field: String },
    UnknownCharacter { name: String },
    UnknownBackground { name: String },
    MalformedCondition { index: usize, reason: String },
    UnknownNodeType { type_name: String },
    EmptySwitch,
}

impl Finding {
    /// Errors stop execution when reached; warnings degrade gracefully.
    pub fn severity(&self) -> Severity {
        match self {
            Finding::MissingContinuation
            | Finding::UnknownNodeType { .. }
            | Finding::UnresolvedChoice { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Orphan => write!(f, "not reachable from the entry node"),
            Finding::UnresolvedChoice { index } => write!(f, "choice {} points nowhere", index),
            Finding::MissingContinuation => write!(f, "setter has no continuation"),
            Finding::UnknownField { field } => write!(f, "unknown field '{}'", field),
            Finding::UnknownCharacter { name } => write!(f, "unknown character '{}'", name),
            Finding::UnknownBackground { name } => write!(f, "unknown background '{}'", name),
            Finding::MalformedCondition { index, reason } => {
                write!(f, "choice {} has a malformed condition: {}", index, reason)
            }
            Finding::UnknownNodeType { type_name } => write!(f, "unknown node type '{}'", type_name),
            Finding::EmptySwitch => write!(f, "switch has no choices"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    pub node: NodeId,
    pub finding: Finding,
}

impl LintIssue {
    pub fn severity(&self) -> Severity {
        self.finding.severity()
    }
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}: {}", self.node, self.finding)
    }
}

/// Check every node. Issues come out in node id order.
pub fn lint(graph: &StoryGraph) -> Vec<LintIssue> {
    let reachable = graph.reachable();
    let mut issues = Vec::new();

    for node in graph.nodes() {
        let mut report = |finding| issues.push(LintIssue { node: node.id, finding });

        if !reachable.contains(&node.id) {
            report(Finding::Orphan);
        }
        if !matches!(node.kind, NodeKind::Setter(_)) {
            for (index, choice) in node.choices().iter().enumerate() {
                if choice.target.is_none() {
                    report(Finding::UnresolvedChoice { index });
                }
            }
        }

        match &node.kind {
            NodeKind::Dialogue(d) => {
                if !d.speaker.is_empty() && graph.character(&d.speaker).is_none() {
                    report(Finding::UnknownCharacter {
                        name: d.speaker.clone(),
                    });
                }
                if !d.background.is_empty()
                    && d.background != KEEP_BACKGROUND
                    && graph.background(&d.background).is_none()
                {
                    report(Finding::UnknownBackground {
                        name: d.background.clone(),
                    });
                }
            }
            NodeKind::Setter(s) => {
                if !graph.has_field(&s.field) {
                    report(Finding::UnknownField {
                        field: s.field.clone(),
                    });
                }
                if s.choices.len() != 1 || s.choices[0].target.is_none() {
                    report(Finding::MissingContinuation);
                }
            }
            NodeKind::Switch(s) => {
                if s.choices.is_empty() {
                    report(Finding::EmptySwitch);
                }
                for (index, choice) in s.choices.iter().enumerate() {
                    let reason = match Condition::parse(&choice.label) {
                        Ok(c) if c.operator.reads_field() && !graph.has_field(&c.field) => {
                            ConditionError::UnknownField(c.field)
                        }
                        Ok(_) => continue,
                        Err(e) => e,
                    };
                    report(Finding::MalformedCondition {
                        index,
                        reason: reason.to_string(),
                    });
                }
            }
            NodeKind::Unknown { type_name, .. } => report(Finding::UnknownNodeType {
                type_name: type_name.clone(),
            }),
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::node::{Choice, DialogueNode, Node, SetterNode, SwitchNode};
    use crate::schema::story::StoryData;

    fn graph(nodes: Vec<Node>) -> StoryGraph {
        StoryGraph::from_story(StoryData {
            fields: vec!["hp".to_string()],
            nodes,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn clean_graph_has_no_issues() {
        let g = graph(vec![
            Node::dialogue(
                NodeId(0),
                DialogueNode {
                    choices: vec![Choice::new("go", NodeId(1))],
                    ..Default::default()
                },
            ),
            Node::setter(
                NodeId(1),
                SetterNode {
                    field: "hp".to_string(),
                    value: 1,
                    choices: vec![Choice::new("", NodeId(0))],
                    ..Default::default()
                },
            ),
        ]);
        assert!(lint(&g).is_empty());
    }

    #[test]
    fn reports_each_problem_kind() {
        let g = graph(vec![
            Node::dialogue(
                NodeId(0),
                DialogueNode {
                    speaker: "Nobody".to_string(),
                    background: "Void".to_string(),
                    choices: vec![Choice::new("a", NodeId(1)), Choice::unresolved("b")],
                    ..Default::default()
                },
            ),
            Node::switch(
                NodeId(1),
                SwitchNode {
                    choices: vec![
                        Choice::new("hp;??;1", NodeId(2)),
                        Choice::new("mana;>;1", NodeId(2)),
                        Choice::new("x;Always;0", NodeId(2)),
                    ],
                },
            ),
            Node::setter(
                NodeId(2),
                SetterNode {
                    field: "gold".to_string(),
                    ..Default::default()
                },
            ),
            Node::switch(NodeId(5), SwitchNode::default()),
        ]);
        let issues = lint(&g);
        let findings: Vec<_> = issues.iter().map(|i| (i.node.0, &i.finding)).collect();

        assert!(findings.contains(&(0, &Finding::UnresolvedChoice { index: 1 })));
        assert!(findings.contains(&(0, &Finding::UnknownCharacter { name: "Nobody".to_string() })));
        assert!(findings.contains(&(0, &Finding::UnknownBackground { name: "Void".to_string() })));
        assert!(findings.contains(&(2, &Finding::UnknownField { field: "gold".to_string() })));
        assert!(findings.contains(&(2, &Finding::MissingContinuation)));
        assert!(findings.contains(&(5, &Finding::Orphan)));
        assert!(findings.contains(&(5, &Finding::EmptySwitch)));

        let malformed: Vec<_> = issues
            .iter()
            .filter_map(|i| match &i.finding {
                Finding::MalformedCondition { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(malformed, vec![0, 1]);
    }

    #[test]
    fn severity_split() {
        assert_eq!(Finding::MissingContinuation.severity(), Severity::Error);
        assert_eq!(Finding::Orphan.severity(), Severity::Warning);
        let issue = LintIssue {
            node: NodeId(3),
            finding: Finding::UnresolvedChoice { index: 0 },
        };
        assert_eq!(issue.to_string(), "node #3: choice 0 points nowhere");
    }
}
