//! Judging tools and scenario results.
//!
//! Tool scorecards are requested concurrently, one independent judge call
//! per tool. Step scorecards are requested in step order, followed by one
//! call for the plan as a whole. A failed judge call never removes a slot:
//! its place is held by an all-N/A scorecard that says why.

use crate::interview::judge::{ChatModel, JudgeClient};
use crate::interview::orchestrator::InterviewPhase;
use crate::interview::prompts;
use crate::interview::rubric::{PlanScoreCard, Rubric, StepScoreCard, ToolScoreCard};
use crate::interview::scenario::{ExecutionReport, ScenarioPlan};
use crate::interview::scorecard::{FunctionalTestScoreCard, ScoredStep};
use crate::interview::timeout::PhaseTimeout;
use crate::mcp::protocol::Tool;
use futures::future::join_all;
use std::time::Duration;

pub const SCORING_DISABLED: &str = "Scoring disabled";

/// Score every tool
///
/// The result is index-aligned with `tools`. With `enabled` false the judge
/// is never called.
pub async fn score_tools<M: ChatModel>(
    judge: &JudgeClient<M>,
    tools: &[Tool],
    enabled: bool,
) -> Vec<ToolScoreCard> {
    if !enabled {
        return tools
            .iter()
            .map(|_| ToolScoreCard::not_applicable(SCORING_DISABLED))
            .collect();
    }

    let results = join_all(
        tools
            .iter()
            .map(|tool| judge.complete::<ToolScoreCard>(prompts::tool_scoring(tool))),
    )
    .await;

    let mut failed = 0usize;
    let scorecards: Vec<ToolScoreCard> = results
        .into_iter()
        .zip(tools)
        .map(|(result, tool)| match result {
            Ok(scorecard) => scorecard,
            Err(e) => {
                failed += 1;
                tracing::warn!("Failed to score tool {}: {}", tool.name, e);
                ToolScoreCard::not_applicable(&format!("Scoring failed: {}", e))
            }
        })
        .collect();

    tracing::info!(
        "Scored {} tools ({} failed)",
        scorecards.len() - failed,
        failed
    );
    scorecards
}

/// Judge each executed step, then the scenario as a whole
///
/// Each judge call runs under `analysis_timeout`. A call that fails or times
/// out leaves an N/A scorecard for that step (or the plan) and the rest carry
/// on.
pub async fn score_results<M: ChatModel>(
    judge: &JudgeClient<M>,
    plan: ScenarioPlan,
    report: ExecutionReport,
    tools: &[Tool],
    enabled: bool,
    analysis_timeout: Duration,
) -> FunctionalTestScoreCard {
    let budget = PhaseTimeout::new(InterviewPhase::ScoringResults, analysis_timeout);
    let totals = report.request_totals();

    let mut judged = Vec::with_capacity(report.steps.len());
    for (index, execution) in report.steps.into_iter().enumerate() {
        let scorecard = if enabled {
            let tool = tools.iter().find(|t| t.name == execution.step.tool_name);
            let result = budget
                .run(judge.complete::<StepScoreCard>(prompts::step_scoring(&execution, tool)))
                .await;
            match result {
                Ok(Ok(scorecard)) => scorecard,
                Ok(Err(e)) => {
                    tracing::warn!("Failed to score step {}: {}", index + 1, e);
                    StepScoreCard::not_applicable(&format!("Scoring failed: {}", e))
                }
                Err(elapsed) => {
                    tracing::warn!("Step {}: {}", index + 1, elapsed);
                    StepScoreCard::not_applicable(&format!("Scoring failed: {}", elapsed))
                }
            }
        } else {
            StepScoreCard::not_applicable(SCORING_DISABLED)
        };
        judged.push((execution, scorecard));
    }

    let plan_scorecard = if enabled {
        let result = budget
            .run(judge.complete::<PlanScoreCard>(prompts::plan_scoring(&plan, &judged, totals)))
            .await;
        match result {
            Ok(Ok(scorecard)) => scorecard,
            Ok(Err(e)) => {
                tracing::warn!("Failed to score scenario: {}", e);
                PlanScoreCard::not_applicable(&format!("Scoring failed: {}", e))
            }
            Err(elapsed) => {
                tracing::warn!("Scenario: {}", elapsed);
                PlanScoreCard::not_applicable(&format!("Scoring failed: {}", elapsed))
            }
        }
    } else {
        PlanScoreCard::not_applicable(SCORING_DISABLED)
    };

    FunctionalTestScoreCard {
        plan,
        steps: judged
            .into_iter()
            .map(|(execution, scorecard)| ScoredStep {
                execution,
                scorecard,
            })
            .collect(),
        scorecard: plan_scorecard,
        aborted: report.aborted,
    }
}
