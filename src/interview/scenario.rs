//! Scenario synthesis and execution.
//!
//! The judge writes a multi-step plan that exercises the server's tools;
//! the executor then runs the plan, one step at a time, against the live
//! session. Steps run strictly in order since later steps may rely on what
//! earlier ones created.

use crate::error::JudgeError;
use crate::interview::callbacks::RequestCounts;
use crate::interview::judge::{ChatModel, JudgeClient};
use crate::interview::prompts;
use crate::interview::session::Session;
use crate::mcp::protocol::{CallToolResult, Tool};
use crate::metrics;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};

/// An ordered test plan for one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPlan {
    /// What the plan sets out to show, in prose
    #[serde(default)]
    pub plan: String,
    pub steps: Vec<PlanStep>,
}

impl ScenarioPlan {
    /// Reply shape the judge must follow when writing a plan
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "plan": {
                    "type": "string",
                    "description": "A short description of what the scenario exercises"
                },
                "steps": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "tool_name": {"type": "string"},
                            "tool_arguments": {
                                "type": "object",
                                "description": "Arguments matching the tool's input schema"
                            },
                            "justification": {
                                "type": "string",
                                "description": "Why this step is part of the scenario"
                            },
                            "expected_output": {
                                "type": "string",
                                "description": "What a correct result looks like"
                            }
                        },
                        "required": ["tool_name", "tool_arguments", "justification", "expected_output"]
                    }
                }
            },
            "required": ["plan", "steps"]
        })
    }
}

/// One tool invocation in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool_name: String,

    #[serde(default = "empty_arguments")]
    pub tool_arguments: Value,

    #[serde(default)]
    pub justification: String,

    #[serde(default)]
    pub expected_output: String,
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

/// Raw outcome of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    #[serde(flatten)]
    pub step: PlanStep,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<CallToolResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,

    /// Server-initiated requests observed during this step only
    #[serde(flatten)]
    pub requests: RequestCounts,

    #[serde(default)]
    pub duration_ms: u64,
}

impl StepExecution {
    pub fn succeeded(&self) -> bool {
        self.exception.is_none() && self.tool_output.as_ref().is_some_and(|o| !o.is_error)
    }

    /// Text shown to the judge and in reports
    pub fn output_text(&self) -> String {
        match (&self.tool_output, &self.exception) {
            (_, Some(exception)) => format!("Exception: {}", exception),
            (Some(output), None) => match &output.structured_content {
                Some(structured) => structured.to_string(),
                None => output.text(),
            },
            (None, None) => String::new(),
        }
    }
}

/// Everything the executor managed to run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    pub steps: Vec<StepExecution>,

    /// Set when the session broke and the remaining steps were skipped
    pub aborted: Option<String>,
}

impl ExecutionReport {
    pub fn request_totals(&self) -> RequestCounts {
        self.steps.iter().map(|s| s.requests).sum()
    }
}

/// Ask the judge for a scenario covering `tools`
///
/// There is no fallback: without a plan there is nothing to execute, so the
/// error goes straight back to the caller.
pub async fn synthesize<M: ChatModel>(
    judge: &JudgeClient<M>,
    tools: &[Tool],
) -> Result<ScenarioPlan, JudgeError> {
    let plan: ScenarioPlan = judge.complete(prompts::scenario_synthesis(tools)).await?;
    tracing::info!("Synthesized scenario with {} steps", plan.steps.len());
    Ok(plan)
}

/// Run every step of `plan` in order
///
/// A failing tool call is recorded on its step and execution moves on. Only
/// a failure that leaves the session unusable stops the run; the steps run
/// so far are returned and the rest are skipped.
pub async fn execute<S: Session>(
    session: &mut S,
    plan: &ScenarioPlan,
    call_timeout: Duration,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();
    execute_into(session, plan, call_timeout, &mut report).await;
    report
}

/// Like [`execute`], appending to `report` as each step finishes
///
/// Dropping the future part way (an outer timeout) leaves the finished steps
/// in `report`.
pub async fn execute_into<S: Session>(
    session: &mut S,
    plan: &ScenarioPlan,
    call_timeout: Duration,
    report: &mut ExecutionReport,
) {
    for (index, step) in plan.steps.iter().enumerate() {
        tracing::debug!("Step {}: calling {}", index + 1, step.tool_name);
        let before = session.request_counts();
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            call_timeout,
            session.call(&step.tool_name, &step.tool_arguments),
        )
        .await;

        let elapsed = started.elapsed();
        let requests = session.request_counts().since(&before);
        metrics::TOOL_CALL_DURATION_SECONDS.observe(elapsed.as_secs_f64());

        let mut execution = StepExecution {
            step: step.clone(),
            tool_output: None,
            exception: None,
            requests,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };

        let mut fatal = None;
        match outcome {
            Ok(Ok(output)) => {
                let label = if output.is_error { "tool_error" } else { "ok" };
                metrics::TOOL_CALLS_TOTAL.with_label_values(&[label]).inc();
                execution.tool_output = Some(output);
            }
            Ok(Err(e)) => {
                metrics::TOOL_CALLS_TOTAL.with_label_values(&["exception"]).inc();
                tracing::warn!("Step {} ({}) failed: {}", index + 1, step.tool_name, e);
                if !session.is_usable() {
                    fatal = Some(e.to_string());
                }
                execution.exception = Some(e.to_string());
            }
            Err(_) => {
                metrics::TOOL_CALLS_TOTAL.with_label_values(&["timeout"]).inc();
                let message = format!(
                    "Tool call timed out after {} seconds",
                    call_timeout.as_secs()
                );
                tracing::warn!("Step {} ({}): {}", index + 1, step.tool_name, message);
                execution.exception = Some(message);
            }
        }

        report.steps.push(execution);

        if let Some(reason) = fatal {
            let skipped = plan.steps.len() - index - 1;
            tracing::error!(
                "Session unusable after step {}, skipping {} remaining steps",
                index + 1,
                skipped
            );
            report.aborted = Some(reason);
            break;
        }
    }
}
