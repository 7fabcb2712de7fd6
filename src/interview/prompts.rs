//! Conversations sent to the judge.
//!
//! Each builder embeds the JSON shape the reply must take, so the typed
//! judge client can hold the model to it.

use crate::interview::callbacks::RequestCounts;
use crate::interview::judge::ChatMessage;
use crate::interview::rubric::{PlanScoreCard, Rubric, StepScoreCard, ToolScoreCard};
use crate::interview::scenario::{ScenarioPlan, StepExecution};
use crate::mcp::protocol::Tool;
use serde_json::{json, Value};

const SYSTEM: &str = "You are an expert reviewer of Model Context Protocol (MCP) servers. \
You judge how usable a server's tools are for an AI agent, and you always answer with \
a single JSON value and nothing else.";

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

fn reply_format(schema: &Value) -> String {
    format!(
        "Reply with JSON matching this schema. For every item give a short justification \
first, then the verdict. Use \"N/A\" only when an item genuinely does not apply.\n\n{}",
        pretty(schema)
    )
}

/// Judge one tool's name, description and schemas
pub fn tool_scoring(tool: &Tool) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM),
        ChatMessage::user(format!(
            "Evaluate the following tool definition.\n\n{}\n\n{}",
            pretty(tool),
            reply_format(&ToolScoreCard::schema())
        )),
    ]
}

/// Ask for a test scenario that exercises `tools`
pub fn scenario_synthesis(tools: &[Tool]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM),
        ChatMessage::user(format!(
            "Write a realistic test scenario for an MCP server with these tools:\n\n{}\n\n\
The scenario is a sequence of tool calls that an agent would make to accomplish a \
plausible task. Cover as many tools as sensibly possible, use arguments that satisfy \
each input schema, order steps so that later ones can use what earlier ones produce, \
and avoid destructive operations outside of anything the scenario itself creates.\n\n\
Reply with JSON matching this schema:\n\n{}",
            pretty(&tools),
            pretty(&ScenarioPlan::schema())
        )),
    ]
}

/// Judge one executed step
pub fn step_scoring(execution: &StepExecution, tool: Option<&Tool>) -> Vec<ChatMessage> {
    let definition = match tool {
        Some(tool) => pretty(tool),
        None => format!("The server has no tool named {:?}.", execution.step.tool_name),
    };
    vec![
        ChatMessage::system(SYSTEM),
        ChatMessage::user(format!(
            "Evaluate the result of one tool call from a test scenario.\n\n\
Tool definition:\n{}\n\n\
Input arguments:\n{}\n\n\
Justification for the call:\n{}\n\n\
Expected output:\n{}\n\n\
Actual output:\n{}\n\n\
Server-initiated requests during the call:\n{}\n\n{}",
            definition,
            pretty(&execution.step.tool_arguments),
            execution.step.justification,
            execution.step.expected_output,
            execution.output_text(),
            pretty(&execution.requests),
            reply_format(&StepScoreCard::schema())
        )),
    ]
}

/// Judge the scenario as a whole
pub fn plan_scoring(
    plan: &ScenarioPlan,
    steps: &[(StepExecution, StepScoreCard)],
    totals: RequestCounts,
) -> Vec<ChatMessage> {
    let steps: Vec<Value> = steps
        .iter()
        .enumerate()
        .map(|(index, (execution, scorecard))| {
            json!({
                "step": index + 1,
                "tool_name": execution.step.tool_name,
                "tool_arguments": execution.step.tool_arguments,
                "expected_output": execution.step.expected_output,
                "actual_output": execution.output_text(),
                "scorecard": scorecard,
            })
        })
        .collect();

    vec![
        ChatMessage::system(SYSTEM),
        ChatMessage::user(format!(
            "Evaluate the test scenario as a whole. PRIORITIZE EXECUTION SUCCESS: a scenario \
whose calls mostly failed does not meet expectations, however good the individual error \
messages were.\n\n\
Plan:\n{}\n\n\
Executed steps with their individual evaluations:\n{}\n\n\
Total server-initiated requests:\n{}\n\n{}",
            plan.plan,
            pretty(&steps),
            pretty(&totals),
            reply_format(&PlanScoreCard::schema())
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::judge::Role;
    use crate::interview::scenario::PlanStep;

    fn tool() -> Tool {
        serde_json::from_value(json!({
            "name": "read_file",
            "description": "Read a file",
            "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}}
        }))
        .unwrap()
    }

    #[test]
    fn test_tool_prompt_embeds_tool_and_rubric() {
        let messages = tool_scoring(&tool());
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("read_file"));
        assert!(messages[1].content.contains("descriptiveness"));
        assert!(messages[1].content.contains("tool_output_schema"));
    }

    #[test]
    fn test_step_prompt_names_missing_tool() {
        let execution = StepExecution {
            step: PlanStep {
                tool_name: "ghost".to_string(),
                tool_arguments: json!({"x": 1}),
                justification: "look it up".to_string(),
                expected_output: "something".to_string(),
            },
            tool_output: None,
            exception: Some("Method not found".to_string()),
            requests: RequestCounts::default(),
            duration_ms: 0,
        };
        let messages = step_scoring(&execution, None);
        assert!(messages[1].content.contains("no tool named \"ghost\""));
        assert!(messages[1].content.contains("Exception: Method not found"));
        assert!(messages[1].content.contains("no_silent_error"));
    }

    #[test]
    fn test_plan_prompt_prioritizes_execution() {
        let plan = ScenarioPlan {
            plan: "round trip".to_string(),
            steps: vec![],
        };
        let messages = plan_scoring(&plan, &[], RequestCounts::default());
        assert!(messages[1].content.contains("PRIORITIZE EXECUTION SUCCESS"));
        assert!(messages[1].content.contains("round trip"));
    }
}
