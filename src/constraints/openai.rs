//! Limits imposed by OpenAI function calling.

use crate::constraints::tokens::estimate_tokens;
use crate::constraints::{Constraint, ToolConstraint, ToolResultConstraint, Violation};
use crate::interview::scorecard::{ScoredStep, ServerScoreCard};
use crate::mcp::protocol::Tool;
use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_TOOLS: usize = 128;
pub const RECOMMENDED_MAX_TOOLS: usize = 20;
pub const MAX_TOOL_NAME_LENGTH: usize = 64;

lazy_static! {
    static ref TOOL_NAME: Regex =
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Failed to compile tool name pattern");
}

/// Context windows checked by [`ToolResultTokens`]
pub const MODEL_TOKEN_BUDGETS: [(&str, u64); 5] = [
    ("gpt-4.1", 1_000_000),
    ("gpt-4o", 128_000),
    ("o1", 200_000),
    ("o3", 200_000),
    ("o4-mini", 200_000),
];

/// Critical above 128 tools, warning from 20
pub struct ToolCount;

impl Constraint for ToolCount {
    fn id(&self) -> &'static str {
        "openai-tool-count"
    }

    fn evaluate(&self, scorecard: &ServerScoreCard) -> Vec<Violation> {
        let count = scorecard.tools.len();
        if count > MAX_TOOLS {
            vec![Violation::critical(
                self.id(),
                format!(
                    "Server must contain at most {} tools (found {}).",
                    MAX_TOOLS, count
                ),
            )]
        } else if count >= RECOMMENDED_MAX_TOOLS {
            vec![Violation::warning(
                self.id(),
                format!(
                    "Server should contain less than {} tools (found {}).",
                    RECOMMENDED_MAX_TOOLS, count
                ),
            )]
        } else {
            Vec::new()
        }
    }
}

pub struct ToolNameLength;

impl ToolConstraint for ToolNameLength {
    fn id(&self) -> &'static str {
        "openai-tool-name-length"
    }

    fn evaluate_tool(&self, tool: &Tool) -> Vec<Violation> {
        let length = tool.name.chars().count();
        if length > MAX_TOOL_NAME_LENGTH {
            vec![Violation::critical(
                self.id(),
                format!(
                    "Tool {}: name must be at most {} characters (found {}).",
                    tool.name, MAX_TOOL_NAME_LENGTH, length
                ),
            )]
        } else {
            Vec::new()
        }
    }
}

pub struct ToolNamePattern;

impl ToolConstraint for ToolNamePattern {
    fn id(&self) -> &'static str {
        "openai-tool-name-pattern"
    }

    fn evaluate_tool(&self, tool: &Tool) -> Vec<Violation> {
        if TOOL_NAME.is_match(&tool.name) {
            Vec::new()
        } else {
            vec![Violation::critical(
                self.id(),
                format!(
                    "Tool {}: name must be a valid identifier ({}).",
                    tool.name,
                    TOOL_NAME.as_str()
                ),
            )]
        }
    }
}

/// Critical for each model context a single tool result would overflow
pub struct ToolResultTokens {
    budgets: Vec<(String, u64)>,
}

impl Default for ToolResultTokens {
    fn default() -> Self {
        Self::new(
            MODEL_TOKEN_BUDGETS
                .iter()
                .map(|(model, budget)| (model.to_string(), *budget))
                .collect(),
        )
    }
}

impl ToolResultTokens {
    pub fn new(budgets: Vec<(String, u64)>) -> Self {
        Self { budgets }
    }
}

impl ToolResultConstraint for ToolResultTokens {
    fn id(&self) -> &'static str {
        "openai-tool-result-tokens"
    }

    fn evaluate_result(&self, index: usize, step: &ScoredStep) -> Vec<Violation> {
        let Some(output) = &step.execution.tool_output else {
            return Vec::new();
        };
        let text = serde_json::to_string(output).unwrap_or_default();
        let tokens = estimate_tokens(&text);

        self.budgets
            .iter()
            .filter(|(_, budget)| tokens > *budget)
            .map(|(model, budget)| {
                Violation::critical(
                    self.id(),
                    format!(
                        "Step {} ({}): result of ~{} tokens exceeds the {} token limit of {}.",
                        index + 1,
                        step.execution.step.tool_name,
                        tokens,
                        budget,
                        model
                    ),
                )
            })
            .collect()
    }
}
