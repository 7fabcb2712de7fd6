//! Policy checks over a finished scorecard.
//!
//! A constraint looks at a [`ServerScoreCard`] and reports zero or more
//! [`Violation`]s. Constraints are independent and stateless; the registry
//! runs each in turn and concatenates what they find. Adding a check means
//! appending it to [`ConstraintSet::all`].
//!
//! Most checks only care about one tool or one tool result at a time. Those
//! implement [`ToolConstraint`] or [`ToolResultConstraint`] and are wrapped
//! in [`PerTool`] / [`PerToolResult`] to become full constraints.

pub mod openai;
pub mod schema_flatness;
pub mod tokens;

use crate::interview::scorecard::{ScoredStep, ServerScoreCard};
use crate::mcp::protocol::Tool;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use openai::{ToolCount, ToolNameLength, ToolNamePattern, ToolResultTokens};
pub use schema_flatness::InputSchemaFlatness;
pub use tokens::estimate_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        })
    }
}

/// One finding from one constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule id of the constraint that fired
    pub constraint: String,
    pub message: String,
    pub severity: Severity,
}

impl Violation {
    pub fn warning(constraint: &str, message: impl Into<String>) -> Self {
        Self {
            constraint: constraint.to_string(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn critical(constraint: &str, message: impl Into<String>) -> Self {
        Self {
            constraint: constraint.to_string(),
            message: message.into(),
            severity: Severity::Critical,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// A check over a whole scorecard
pub trait Constraint: Send + Sync {
    /// Stable rule id, e.g. `openai-tool-count`
    fn id(&self) -> &'static str;

    fn evaluate(&self, scorecard: &ServerScoreCard) -> Vec<Violation>;
}

/// A check over a single tool definition
pub trait ToolConstraint: Send + Sync {
    fn id(&self) -> &'static str;

    fn evaluate_tool(&self, tool: &Tool) -> Vec<Violation>;
}

/// A check over a single executed step's output
pub trait ToolResultConstraint: Send + Sync {
    fn id(&self) -> &'static str;

    /// `index` is the zero-based step position
    fn evaluate_result(&self, index: usize, step: &ScoredStep) -> Vec<Violation>;
}

/// Runs a [`ToolConstraint`] over every tool, in tool order
pub struct PerTool<C>(pub C);

impl<C: ToolConstraint> Constraint for PerTool<C> {
    fn id(&self) -> &'static str {
        self.0.id()
    }

    fn evaluate(&self, scorecard: &ServerScoreCard) -> Vec<Violation> {
        scorecard
            .tools
            .iter()
            .flat_map(|tool| self.0.evaluate_tool(tool))
            .collect()
    }
}

/// Runs a [`ToolResultConstraint`] over every step that produced output
pub struct PerToolResult<C>(pub C);

impl<C: ToolResultConstraint> Constraint for PerToolResult<C> {
    fn id(&self) -> &'static str {
        self.0.id()
    }

    fn evaluate(&self, scorecard: &ServerScoreCard) -> Vec<Violation> {
        let Some(functional) = &scorecard.functional_test_scorecard else {
            return Vec::new();
        };
        functional
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.execution.tool_output.is_some())
            .flat_map(|(index, step)| self.0.evaluate_result(index, step))
            .collect()
    }
}

/// Ordered registry of constraints
#[derive(Default)]
pub struct ConstraintSet {
    constraints: Vec<Box<dyn Constraint>>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in check, in reporting order
    pub fn all() -> Self {
        Self::new()
            .with(ToolCount)
            .with(PerTool(ToolNameLength))
            .with(PerTool(ToolNamePattern))
            .with(PerToolResult(ToolResultTokens::default()))
            .with(PerTool(InputSchemaFlatness))
    }

    pub fn with(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Box::new(constraint));
        self
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.constraints.iter().map(|c| c.id()).collect()
    }
}

impl Constraint for ConstraintSet {
    fn id(&self) -> &'static str {
        "all"
    }

    fn evaluate(&self, scorecard: &ServerScoreCard) -> Vec<Violation> {
        self.constraints
            .iter()
            .flat_map(|constraint| constraint.evaluate(scorecard))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::interview::orchestrator::InterviewPhase;
    use crate::mcp::params::ServerParameters;
    use serde_json::json;

    pub(crate) fn scorecard_with_tools(names: &[&str]) -> ServerScoreCard {
        let mut card = ServerScoreCard::new(
            ServerParameters::from_target("node server.js").unwrap(),
            "gpt-4o",
        );
        card.phase = InterviewPhase::Done;
        card.tools = names
            .iter()
            .map(|name| serde_json::from_value(json!({"name": name})).unwrap())
            .collect();
        card
    }

    #[test]
    fn test_registry_order_is_stable() {
        assert_eq!(
            ConstraintSet::all().ids(),
            vec![
                "openai-tool-count",
                "openai-tool-name-length",
                "openai-tool-name-pattern",
                "openai-tool-result-tokens",
                "tool-input-schema-flatness",
            ]
        );
    }

    #[test]
    fn test_clean_server_has_no_violations() {
        let card = scorecard_with_tools(&["read_file", "write_file"]);
        assert!(ConstraintSet::all().evaluate(&card).is_empty());
    }

    #[test]
    fn test_bad_name_fires_exactly_once() {
        let card = scorecard_with_tools(&["ok_tool", "123bad"]);
        let violations = ConstraintSet::all().evaluate(&card);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint, "openai-tool-name-pattern");
        assert!(violations[0].is_critical());
        assert!(violations[0].message.contains("123bad"));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let long = "x".repeat(70);
        let mut names: Vec<String> = (0..25).map(|i| format!("tool-{}", i)).collect();
        names.push(long);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let card = scorecard_with_tools(&refs);

        let set = ConstraintSet::all();
        let first = set.evaluate(&card);
        let second = set.evaluate(&card);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_severity_ordering_and_format() {
        assert!(Severity::Critical > Severity::Warning);
        assert_eq!(serde_json::to_value(Severity::Critical).unwrap(), "critical");
    }
}
