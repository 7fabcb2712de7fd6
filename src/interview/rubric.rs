//! Rubrics the judge fills in.
//!
//! Every leaf is a [`Score`]: pass, fail, or N/A with a justification. N/A is
//! a real answer, not an error. It marks an item that was deliberately not
//! judged (scoring disabled, or scoring failed) and is left out of ratios.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "pass")]
    Pass,
    #[serde(rename = "fail")]
    Fail,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::NotApplicable => "N/A",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub justification: String,
    pub score: Verdict,
}

impl Score {
    pub fn pass(justification: impl Into<String>) -> Self {
        Self {
            justification: justification.into(),
            score: Verdict::Pass,
        }
    }

    pub fn fail(justification: impl Into<String>) -> Self {
        Self {
            justification: justification.into(),
            score: Verdict::Fail,
        }
    }

    pub fn not_applicable(reason: impl Into<String>) -> Self {
        Self {
            justification: reason.into(),
            score: Verdict::NotApplicable,
        }
    }

    pub fn is_applicable(&self) -> bool {
        self.score != Verdict::NotApplicable
    }
}

/// Classification of a tool call outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Unauthorized,
    #[serde(rename = "Bad Request")]
    BadRequest,
    #[serde(rename = "Internal Error")]
    InternalError,
    #[serde(rename = "MCP Error")]
    McpError,
    #[serde(rename = "Other Error")]
    OtherError,
    #[serde(rename = "No Error")]
    NoError,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl ErrorCategory {
    const LABELS: [&'static str; 7] = [
        "Unauthorized",
        "Bad Request",
        "Internal Error",
        "MCP Error",
        "Other Error",
        "No Error",
        "N/A",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTypeScore {
    pub justification: String,
    pub value: ErrorCategory,
}

impl ErrorTypeScore {
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        Self {
            justification: reason.into(),
            value: ErrorCategory::NotApplicable,
        }
    }
}

/// A record of scores the judge fills in
pub trait Rubric: Serialize + DeserializeOwned + Send {
    /// JSON description of the expected reply, shown to the judge
    fn schema() -> Value;

    /// The same shape with every verdict N/A
    fn not_applicable(reason: &str) -> Self;

    /// Every pass/fail leaf in declaration order
    fn scores(&self) -> Vec<&Score>;
}

fn score_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "description": description,
        "properties": {
            "justification": {"type": "string"},
            "score": {"enum": ["pass", "fail", "N/A"]}
        },
        "required": ["justification", "score"]
    })
}

fn error_type_schema() -> Value {
    json!({
        "type": "object",
        "description": "Which kind of error, if any, the tool call produced",
        "properties": {
            "justification": {"type": "string"},
            "value": {"enum": ErrorCategory::LABELS}
        },
        "required": ["justification", "value"]
    })
}

fn object_schema(fields: Vec<(&str, Value)>) -> Value {
    let required: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
    let properties: Map<String, Value> = fields
        .into_iter()
        .map(|(name, schema)| (name.to_string(), schema))
        .collect();
    json!({"type": "object", "properties": properties, "required": required})
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolNameScoreCard {
    pub length: Score,
    pub uniqueness: Score,
    pub descriptiveness: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptionScoreCard {
    pub length: Score,
    pub parameters: Score,
    pub examples: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchemaScoreCard {
    pub complexity: Score,
    pub parameters: Score,
    pub optionals: Score,
    pub constraints: Score,
}

impl ToolSchemaScoreCard {
    fn schema(which: &str) -> Value {
        object_schema(vec![
            (
                "complexity",
                score_schema(&format!(
                    "The {} schema is no more deeply nested than necessary",
                    which
                )),
            ),
            (
                "parameters",
                score_schema(&format!(
                    "Every {} property has a clear name, type and description",
                    which
                )),
            ),
            (
                "optionals",
                score_schema("Required and optional properties are marked correctly"),
            ),
            (
                "constraints",
                score_schema("Enums, formats, ranges and defaults are declared where they apply"),
            ),
        ])
    }

    fn not_applicable(reason: &str) -> Self {
        Self {
            complexity: Score::not_applicable(reason),
            parameters: Score::not_applicable(reason),
            optionals: Score::not_applicable(reason),
            constraints: Score::not_applicable(reason),
        }
    }

    fn scores(&self) -> [&Score; 4] {
        [
            &self.complexity,
            &self.parameters,
            &self.optionals,
            &self.constraints,
        ]
    }
}

/// Judgement of one tool's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolScoreCard {
    pub tool_name: ToolNameScoreCard,
    pub tool_description: ToolDescriptionScoreCard,
    pub tool_input_schema: ToolSchemaScoreCard,
    pub tool_output_schema: ToolSchemaScoreCard,
}

impl Rubric for ToolScoreCard {
    fn schema() -> Value {
        object_schema(vec![
            (
                "tool_name",
                object_schema(vec![
                    ("length", score_schema("The name is short but not cryptic")),
                    (
                        "uniqueness",
                        score_schema(
                            "The name is unlikely to collide with tools from other servers",
                        ),
                    ),
                    (
                        "descriptiveness",
                        score_schema("The name alone says what the tool does"),
                    ),
                ]),
            ),
            (
                "tool_description",
                object_schema(vec![
                    (
                        "length",
                        score_schema("The description is long enough to be useful and no longer"),
                    ),
                    (
                        "parameters",
                        score_schema("The description explains the parameters and what they do"),
                    ),
                    (
                        "examples",
                        score_schema("The description gives example usage or example values"),
                    ),
                ]),
            ),
            ("tool_input_schema", ToolSchemaScoreCard::schema("input")),
            ("tool_output_schema", ToolSchemaScoreCard::schema("output")),
        ])
    }

    fn not_applicable(reason: &str) -> Self {
        Self {
            tool_name: ToolNameScoreCard {
                length: Score::not_applicable(reason),
                uniqueness: Score::not_applicable(reason),
                descriptiveness: Score::not_applicable(reason),
            },
            tool_description: ToolDescriptionScoreCard {
                length: Score::not_applicable(reason),
                parameters: Score::not_applicable(reason),
                examples: Score::not_applicable(reason),
            },
            tool_input_schema: ToolSchemaScoreCard::not_applicable(reason),
            tool_output_schema: ToolSchemaScoreCard::not_applicable(reason),
        }
    }

    fn scores(&self) -> Vec<&Score> {
        let mut scores = vec![
            &self.tool_name.length,
            &self.tool_name.uniqueness,
            &self.tool_name.descriptiveness,
            &self.tool_description.length,
            &self.tool_description.parameters,
            &self.tool_description.examples,
        ];
        scores.extend(self.tool_input_schema.scores());
        scores.extend(self.tool_output_schema.scores());
        scores
    }
}

/// Judgement of one executed scenario step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepScoreCard {
    pub error_handling: Score,
    pub error_type: ErrorTypeScore,
    pub no_silent_error: Score,
    pub output_relevance: Score,
    pub output_quality: Score,
    pub schema_compliance: Score,
    pub meets_expectations: Score,
}

impl Rubric for StepScoreCard {
    fn schema() -> Value {
        object_schema(vec![
            (
                "error_handling",
                score_schema(
                    "If the call failed, the error message says what went wrong and how to fix it",
                ),
            ),
            ("error_type", error_type_schema()),
            (
                "no_silent_error",
                score_schema("The output does not hide a failure behind a normal-looking result"),
            ),
            (
                "output_relevance",
                score_schema(
                    "The output is relevant to the tool's purpose and the arguments given",
                ),
            ),
            (
                "output_quality",
                score_schema("The output is well formed, complete and free of noise"),
            ),
            (
                "schema_compliance",
                score_schema("The output matches the declared output schema, if any"),
            ),
            (
                "meets_expectations",
                score_schema("The output matches the expected output described in the plan"),
            ),
        ])
    }

    fn not_applicable(reason: &str) -> Self {
        Self {
            error_handling: Score::not_applicable(reason),
            error_type: ErrorTypeScore::not_applicable(reason),
            no_silent_error: Score::not_applicable(reason),
            output_relevance: Score::not_applicable(reason),
            output_quality: Score::not_applicable(reason),
            schema_compliance: Score::not_applicable(reason),
            meets_expectations: Score::not_applicable(reason),
        }
    }

    fn scores(&self) -> Vec<&Score> {
        vec![
            &self.error_handling,
            &self.no_silent_error,
            &self.output_relevance,
            &self.output_quality,
            &self.schema_compliance,
            &self.meets_expectations,
        ]
    }
}

/// Judgement of the scenario as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanScoreCard {
    pub error_type: ErrorTypeScore,
    pub error_handling: Score,
    pub output_relevance: Score,
    pub schema_compliance: Score,
    pub meets_expectations: Score,
}

impl Rubric for PlanScoreCard {
    fn schema() -> Value {
        object_schema(vec![
            ("error_type", error_type_schema()),
            (
                "error_handling",
                score_schema(
                    "Across the scenario, failures were reported clearly and consistently",
                ),
            ),
            (
                "output_relevance",
                score_schema("Across the scenario, outputs were relevant to the requests"),
            ),
            (
                "schema_compliance",
                score_schema("Across the scenario, outputs matched their declared schemas"),
            ),
            (
                "meets_expectations",
                score_schema("The server as a whole behaved the way the plan expected"),
            ),
        ])
    }

    fn not_applicable(reason: &str) -> Self {
        Self {
            error_type: ErrorTypeScore::not_applicable(reason),
            error_handling: Score::not_applicable(reason),
            output_relevance: Score::not_applicable(reason),
            schema_compliance: Score::not_applicable(reason),
            meets_expectations: Score::not_applicable(reason),
        }
    }

    fn scores(&self) -> Vec<&Score> {
        vec![
            &self.error_handling,
            &self.output_relevance,
            &self.schema_compliance,
            &self.meets_expectations,
        ]
    }
}
