//! Scorecard artifacts.
//!
//! Three files land in the output directory:
//!
//! - `mcp-scorecard.json`: the full scorecard plus constraint violations
//! - `mcp-scorecard.md`: everything, readable
//! - `mcp-scorecard-short.md`: score, violations and one line per step

use crate::constraints::{estimate_tokens, Severity, Violation};
use crate::interview::scorecard::{ScoreBand, ScoredStep, ServerScoreCard};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const JSON_FILE: &str = "mcp-scorecard.json";
pub const MARKDOWN_FILE: &str = "mcp-scorecard.md";
pub const SHORT_MARKDOWN_FILE: &str = "mcp-scorecard-short.md";

/// Longest tool output or argument dump shown in markdown
pub const MAX_OUTPUT_CHARS: usize = 500;

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    scorecard: &'a ServerScoreCard,
    violations: &'a [Violation],
}

/// Paths of the written artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub short_markdown: PathBuf,
}

/// Write all three artifacts into `dir`, creating it if needed
pub fn write_all(
    dir: &Path,
    scorecard: &ServerScoreCard,
    violations: &[Violation],
) -> Result<Artifacts> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let artifacts = Artifacts {
        json: dir.join(JSON_FILE),
        markdown: dir.join(MARKDOWN_FILE),
        short_markdown: dir.join(SHORT_MARKDOWN_FILE),
    };

    write(&artifacts.json, &to_json(scorecard, violations)?)?;
    write(&artifacts.markdown, &render_markdown(scorecard, violations))?;
    write(&artifacts.short_markdown, &render_short_markdown(scorecard, violations))?;

    tracing::info!("Wrote scorecard to {:?}", dir);
    Ok(artifacts)
}

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

pub fn to_json(scorecard: &ServerScoreCard, violations: &[Violation]) -> Result<String> {
    serde_json::to_string_pretty(&JsonReport { scorecard, violations })
        .context("Failed to serialize scorecard")
}

/// Cut `text` to `max` characters, marking the cut
pub fn truncate(text: &str, max: usize) -> String {
    let total = text.chars().count();
    if total <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max).collect();
    format!("{}... ({} more characters)", kept, total - max)
}

/// Estimated token cost of each tool's input schema, in tool order
pub fn schema_token_estimates(scorecard: &ServerScoreCard) -> Vec<(&str, u64)> {
    scorecard
        .tools
        .iter()
        .map(|tool| (tool.name.as_str(), estimate_tokens(&tool.input_schema.to_string())))
        .collect()
}

fn output_tokens(step: &ScoredStep) -> u64 {
    step.execution
        .tool_output
        .as_ref()
        .and_then(|output| serde_json::to_string(output).ok())
        .map(|text| estimate_tokens(&text))
        .unwrap_or(0)
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn step_outcome(step: &ScoredStep) -> &'static str {
    match (&step.execution.exception, &step.execution.tool_output) {
        (Some(_), _) => "exception",
        (None, Some(output)) if output.is_error => "tool error",
        (None, Some(_)) => "ok",
        (None, None) => "no output",
    }
}

/// Flatten a serialized rubric into `(path, verdict, justification)` rows
fn verdict_rows(rubric: &Value) -> Vec<(String, String, String)> {
    fn walk(value: &Value, path: &str, rows: &mut Vec<(String, String, String)>) {
        let Some(object) = value.as_object() else {
            return;
        };
        let justification = object.get("justification").and_then(Value::as_str);
        let verdict = object
            .get("score")
            .or_else(|| object.get("value"))
            .and_then(Value::as_str);
        if let (Some(verdict), Some(justification)) = (verdict, justification) {
            rows.push((path.to_string(), verdict.to_string(), justification.to_string()));
            return;
        }
        for (key, child) in object {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };
            walk(child, &child_path, rows);
        }
    }

    let mut rows = Vec::new();
    walk(rubric, "", &mut rows);
    rows
}

fn render_verdicts(out: &mut String, rubric: &impl Serialize) {
    let Ok(value) = serde_json::to_value(rubric) else {
        return;
    };
    out.push_str("| Check | Verdict | Justification |\n");
    out.push_str("| --- | --- | --- |\n");
    for (path, verdict, justification) in verdict_rows(&value) {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            path,
            verdict,
            cell(&truncate(&justification, MAX_OUTPUT_CHARS))
        ));
    }
    out.push('\n');
}

fn render_header(out: &mut String, scorecard: &ServerScoreCard) {
    out.push_str(&format!("# MCP Interview: {}\n\n", scorecard.server_name()));
    out.push_str(&format!(
        "- Target: `{}` ({})\n",
        scorecard.parameters.display_target(),
        scorecard.parameters.connection_type()
    ));
    out.push_str(&format!(
        "- Score: {:.0}% ({})\n",
        scorecard.score * 100.0,
        ScoreBand::from_score(scorecard.score)
    ));
    out.push_str(&format!("- Judge model: {}\n", scorecard.model));
    out.push_str(&format!(
        "- Interview: {} ({} to {})\n\n",
        scorecard.interview_id,
        scorecard.started_at.to_rfc3339(),
        scorecard.finished_at.to_rfc3339()
    ));
}

fn render_violations(out: &mut String, violations: &[Violation]) {
    out.push_str("## Constraint Violations\n\n");
    if violations.is_empty() {
        out.push_str("None.\n\n");
        return;
    }
    for severity in [Severity::Critical, Severity::Warning] {
        let group: Vec<&Violation> = violations.iter().filter(|v| v.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        out.push_str(&format!("### {} ({})\n\n", severity, group.len()));
        for violation in group {
            out.push_str(&format!("- `{}`: {}\n", violation.constraint, violation.message));
        }
        out.push('\n');
    }
}

fn render_failures(out: &mut String, scorecard: &ServerScoreCard) {
    if scorecard.failures.is_empty() {
        return;
    }
    out.push_str("## Failures\n\n");
    for failure in &scorecard.failures {
        out.push_str(&format!("- {}: {}\n", failure.phase, failure.reason));
    }
    out.push('\n');
}

/// Full markdown view of a scorecard
pub fn render_markdown(scorecard: &ServerScoreCard, violations: &[Violation]) -> String {
    let mut out = String::new();
    render_header(&mut out, scorecard);

    out.push_str("## Analysis\n\n");
    out.push_str(&scorecard.analysis);
    out.push_str("\n\n");

    if let Some(init) = &scorecard.initialize_result {
        out.push_str("## Server\n\n");
        out.push_str(&format!(
            "- Name: {} {}\n- Protocol version: {}\n",
            init.server_info.name, init.server_info.version, init.protocol_version
        ));
        if let Some(instructions) = &init.instructions {
            out.push_str(&format!(
                "- Instructions: {}\n",
                cell(&truncate(instructions, MAX_OUTPUT_CHARS))
            ));
        }
        out.push('\n');

        let caps = &init.capabilities;
        out.push_str("## Capabilities\n\n");
        out.push_str("| Capability | Advertised |\n| --- | --- |\n");
        for (name, flag) in [
            ("tools", caps.tools.is_some()),
            ("resources", caps.resources.is_some()),
            ("prompts", caps.prompts.is_some()),
            ("logging", caps.logging.is_some()),
            ("completions", caps.completions.is_some()),
        ] {
            out.push_str(&format!("| {} | {} |\n", name, yes_no(flag)));
        }
        out.push('\n');
    }

    out.push_str("## Features\n\n");
    out.push_str("| Feature | Count |\n| --- | --- |\n");
    out.push_str(&format!("| Tools | {} |\n", scorecard.tools.len()));
    out.push_str(&format!("| Resources | {} |\n", scorecard.resources.len()));
    out.push_str(&format!("| Resource templates | {} |\n", scorecard.resource_templates.len()));
    out.push_str(&format!("| Prompts | {} |\n\n", scorecard.prompts.len()));

    render_violations(&mut out, violations);
    render_failures(&mut out, scorecard);

    if !scorecard.tools.is_empty() {
        out.push_str("## Tools\n\n");
        out.push_str("| Tool | Description | Input schema tokens |\n| --- | --- | --- |\n");
        for (tool, (_, tokens)) in scorecard.tools.iter().zip(schema_token_estimates(scorecard)) {
            out.push_str(&format!(
                "| {} | {} | ~{} |\n",
                tool.name,
                cell(&truncate(tool.description.as_deref().unwrap_or(""), MAX_OUTPUT_CHARS)),
                tokens
            ));
        }
        out.push('\n');

        for (tool, card) in scorecard.tools.iter().zip(&scorecard.tool_scorecards) {
            out.push_str(&format!("### {}\n\n", tool.name));
            render_verdicts(&mut out, card);
        }
    }

    if !scorecard.resources.is_empty() {
        out.push_str("## Resources\n\n");
        for resource in &scorecard.resources {
            out.push_str(&format!("- `{}`: {}\n", resource.uri, resource.name));
        }
        out.push('\n');
    }

    if !scorecard.resource_templates.is_empty() {
        out.push_str("## Resource Templates\n\n");
        for template in &scorecard.resource_templates {
            out.push_str(&format!("- `{}`: {}\n", template.uri_template, template.name));
        }
        out.push('\n');
    }

    if !scorecard.prompts.is_empty() {
        out.push_str("## Prompts\n\n");
        for prompt in &scorecard.prompts {
            out.push_str(&format!("- {} ({} arguments)\n", prompt.name, prompt.arguments.len()));
        }
        out.push('\n');
    }

    if let Some(functional) = &scorecard.functional_test_scorecard {
        out.push_str("## Functional Test\n\n");
        if !functional.plan.plan.is_empty() {
            out.push_str(&functional.plan.plan);
            out.push_str("\n\n");
        }

        let totals = functional.request_totals();
        out.push_str("| Server request | Count |\n| --- | --- |\n");
        out.push_str(&format!("| Sampling | {} |\n", totals.sampling_requests));
        out.push_str(&format!("| Elicitation | {} |\n", totals.elicitation_requests));
        out.push_str(&format!("| List roots | {} |\n", totals.list_roots_requests));
        out.push_str(&format!("| Logging | {} |\n\n", totals.logging_requests));

        for (index, step) in functional.steps.iter().enumerate() {
            let execution = &step.execution;
            out.push_str(&format!(
                "### Step {}: {} ({})\n\n",
                index + 1,
                execution.step.tool_name,
                step_outcome(step)
            ));
            out.push_str(&format!("- Purpose: {}\n", execution.step.justification));
            out.push_str(&format!("- Expected: {}\n", execution.step.expected_output));
            out.push_str(&format!(
                "- Arguments: `{}`\n",
                truncate(&execution.step.tool_arguments.to_string(), MAX_OUTPUT_CHARS)
            ));
            out.push_str(&format!(
                "- Duration: {} ms, output ~{} tokens\n\n",
                execution.duration_ms,
                output_tokens(step)
            ));
            out.push_str("```\n");
            out.push_str(&truncate(&execution.output_text(), MAX_OUTPUT_CHARS));
            out.push_str("\n```\n\n");
            render_verdicts(&mut out, &step.scorecard);
        }

        let skipped = functional.plan.steps.len().saturating_sub(functional.steps.len());
        if skipped > 0 {
            out.push_str(&format!("{} planned steps were not run.\n\n", skipped));
        }

        out.push_str("### Overall\n\n");
        render_verdicts(&mut out, &functional.scorecard);
    }

    out
}

/// Summary markdown view: score, violations, one line per step
pub fn render_short_markdown(scorecard: &ServerScoreCard, violations: &[Violation]) -> String {
    let mut out = String::new();
    render_header(&mut out, scorecard);

    let tally = scorecard.tally();
    out.push_str(&format!(
        "{} of {} judged items passed; {} not judged.\n\n",
        tally.passed,
        tally.applicable(),
        tally.not_applicable
    ));
    out.push_str(&format!(
        "Tools: {} | Resources: {} | Resource templates: {} | Prompts: {}\n\n",
        scorecard.tools.len(),
        scorecard.resources.len(),
        scorecard.resource_templates.len(),
        scorecard.prompts.len()
    ));

    render_violations(&mut out, violations);
    render_failures(&mut out, scorecard);

    if let Some(functional) = &scorecard.functional_test_scorecard {
        out.push_str("## Steps\n\n");
        out.push_str("| # | Tool | Outcome | Meets expectations |\n| --- | --- | --- | --- |\n");
        for (index, step) in functional.steps.iter().enumerate() {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                index + 1,
                step.execution.step.tool_name,
                step_outcome(step),
                step.scorecard.meets_expectations.score.as_str()
            ));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::tests::scorecard_with_tools;
    use crate::interview::callbacks::RequestCounts;
    use crate::interview::rubric::{PlanScoreCard, Rubric, Score, StepScoreCard, ToolScoreCard};
    use crate::interview::scenario::{PlanStep, ScenarioPlan, StepExecution};
    use crate::interview::scorecard::FunctionalTestScoreCard;
    use crate::mcp::protocol::CallToolResult;
    use serde_json::json;

    fn scored_card() -> ServerScoreCard {
        let mut card = scorecard_with_tools(&["read_file"]);
        let mut tool_card = ToolScoreCard::not_applicable("unscored");
        tool_card.tool_name.length = Score::pass("short and clear");
        card.tool_scorecards = vec![tool_card];

        let step = PlanStep {
            tool_name: "read_file".to_string(),
            tool_arguments: json!({"path": "/tmp/a"}),
            justification: "read something".to_string(),
            expected_output: "file contents".to_string(),
        };
        card.functional_test_scorecard = Some(FunctionalTestScoreCard {
            plan: ScenarioPlan {
                plan: "Read one file.".to_string(),
                steps: vec![step.clone()],
            },
            steps: vec![ScoredStep {
                execution: StepExecution {
                    step,
                    tool_output: Some(CallToolResult {
                        content: vec![json!({"type": "text", "text": "x".repeat(2000)})],
                        ..Default::default()
                    }),
                    exception: None,
                    requests: RequestCounts {
                        sampling_requests: 2,
                        ..Default::default()
                    },
                    duration_ms: 12,
                },
                scorecard: StepScoreCard::not_applicable("disabled"),
            }],
            scorecard: PlanScoreCard::not_applicable("disabled"),
            aborted: None,
        });
        card.finalize();
        card
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate(&"é".repeat(600), MAX_OUTPUT_CHARS);
        assert!(cut.starts_with(&"é".repeat(MAX_OUTPUT_CHARS)));
        assert!(cut.ends_with("(100 more characters)"));
    }

    #[test]
    fn test_verdict_rows_find_leaves() {
        let rows =
            verdict_rows(&serde_json::to_value(StepScoreCard::not_applicable("n/a")).unwrap());
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().any(|(path, verdict, _)| path == "error_type" && verdict == "N/A"));
        assert!(rows.iter().all(|(_, _, justification)| justification == "n/a"));
    }

    #[test]
    fn test_json_includes_violations() {
        let card = scored_card();
        let violations = vec![Violation::warning("openai-tool-count", "too many")];
        let value: Value = serde_json::from_str(&to_json(&card, &violations).unwrap()).unwrap();

        assert_eq!(value["tools"][0]["name"], "read_file");
        assert_eq!(value["violations"][0]["constraint"], "openai-tool-count");
        assert_eq!(value["violations"][0]["severity"], "warning");
    }

    #[test]
    fn test_markdown_sections() {
        let card = scored_card();
        let violations = vec![
            Violation::warning("openai-tool-count", "a warning"),
            Violation::critical("openai-tool-name-pattern", "a critical"),
        ];
        let markdown = render_markdown(&card, &violations);

        assert!(markdown.contains("## Constraint Violations"));
        let critical = markdown.find("### critical (1)").unwrap();
        let warning = markdown.find("### warning (1)").unwrap();
        assert!(critical < warning);
        assert!(markdown.contains("| Tools | 1 |"));
        assert!(markdown.contains("### Step 1: read_file (ok)"));
        assert!(markdown.contains("| Sampling | 2 |"));
        assert!(markdown.contains("tool_name.length | pass | short and clear"));
        assert!(markdown.contains("(1500 more characters)"));
    }

    #[test]
    fn test_short_markdown() {
        let card = scored_card();
        let short = render_short_markdown(&card, &[]);
        assert!(short.contains("None."));
        assert!(short.contains("| 1 | read_file | ok | N/A |"));
        assert!(!short.contains("## Tools"));
    }

    #[test]
    fn test_write_all() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let artifacts = write_all(&out, &scored_card(), &[]).unwrap();

        for path in [&artifacts.json, &artifacts.markdown, &artifacts.short_markdown] {
            assert!(path.exists(), "{:?}", path);
        }
        assert_eq!(artifacts.json.file_name().unwrap(), JSON_FILE);
    }

    #[test]
    fn test_schema_token_estimates() {
        let card = scorecard_with_tools(&["a", "b"]);
        let estimates = schema_token_estimates(&card);
        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates[0].0, "a");
    }
}
