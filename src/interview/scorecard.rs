//! The interview's output artifact and its aggregate score.

use crate::interview::callbacks::RequestCounts;
use crate::interview::orchestrator::InterviewPhase;
use crate::interview::rubric::{PlanScoreCard, Rubric, Score, StepScoreCard, ToolScoreCard, Verdict};
use crate::interview::scenario::{ScenarioPlan, StepExecution};
use crate::mcp::params::ServerParameters;
use crate::mcp::protocol::{InitializeResult, Prompt, Resource, ResourceTemplate, Tool};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Qualitative reading of an aggregate score
///
/// The only place the band cutoffs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    Mixed,
    Poor,
    VeryPoor,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.7 {
            Self::Good
        } else if score >= 0.5 {
            Self::Mixed
        } else if score >= 0.2 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Self::Excellent => "The server is in excellent shape for agent use.",
            Self::Good => "The server is in good shape, with a few items worth improving.",
            Self::Mixed => "The server has mixed quality; several items need attention.",
            Self::Poor => "The server has significant quality problems.",
            Self::VeryPoor => "The server is not ready for agent use.",
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Mixed => "mixed",
            Self::Poor => "poor",
            Self::VeryPoor => "very poor",
        })
    }
}

/// An executed step with its judgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredStep {
    #[serde(flatten)]
    pub execution: StepExecution,
    pub scorecard: StepScoreCard,
}

/// The scenario, what happened, and how it was judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionalTestScoreCard {
    pub plan: ScenarioPlan,
    pub steps: Vec<ScoredStep>,
    pub scorecard: PlanScoreCard,

    /// Why execution stopped before the last step, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl FunctionalTestScoreCard {
    pub fn request_totals(&self) -> RequestCounts {
        self.steps.iter().map(|s| s.execution.requests).sum()
    }
}

/// A phase that failed and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFailure {
    pub phase: InterviewPhase,
    pub reason: String,
}

/// Pass and fail counts over applicable leaves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub not_applicable: usize,
}

impl Tally {
    fn add<'a>(&mut self, scores: impl IntoIterator<Item = &'a Score>) {
        for score in scores {
            match score.score {
                Verdict::Pass => self.passed += 1,
                Verdict::Fail => self.failed += 1,
                Verdict::NotApplicable => self.not_applicable += 1,
            }
        }
    }

    pub fn applicable(&self) -> usize {
        self.passed + self.failed
    }

    /// Pass ratio; 0.0 when nothing was judged
    pub fn ratio(&self) -> f64 {
        match self.applicable() {
            0 => 0.0,
            n => self.passed as f64 / n as f64,
        }
    }
}

/// Full result of interviewing one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerScoreCard {
    pub interview_id: Uuid,
    pub interviewer_version: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub parameters: ServerParameters,

    /// Absent when the session never got as far as negotiating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_result: Option<InitializeResult>,

    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub resource_templates: Vec<ResourceTemplate>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,

    /// Index-aligned with `tools`
    #[serde(default)]
    pub tool_scorecards: Vec<ToolScoreCard>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functional_test_scorecard: Option<FunctionalTestScoreCard>,

    /// Last phase reached
    pub phase: InterviewPhase,

    #[serde(default)]
    pub failures: Vec<PhaseFailure>,

    pub score: f64,
    pub analysis: String,
}

impl ServerScoreCard {
    /// An empty scorecard for `parameters`, before any phase has run
    pub fn new(parameters: ServerParameters, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            interview_id: Uuid::new_v4(),
            interviewer_version: env!("CARGO_PKG_VERSION").to_string(),
            model: model.into(),
            started_at: now,
            finished_at: now,
            parameters,
            initialize_result: None,
            tools: Vec::new(),
            resources: Vec::new(),
            resource_templates: Vec::new(),
            prompts: Vec::new(),
            tool_scorecards: Vec::new(),
            functional_test_scorecard: None,
            phase: InterviewPhase::Idle,
            failures: Vec::new(),
            score: 0.0,
            analysis: String::new(),
        }
    }

    pub fn server_name(&self) -> &str {
        self.initialize_result
            .as_ref()
            .map(|r| r.server_info.name.as_str())
            .unwrap_or("unknown server")
    }

    /// Whether a failure left the interview without a usable result
    pub fn is_unrecoverable(&self) -> bool {
        self.phase == InterviewPhase::Failed
    }

    pub fn record_failure(&mut self, phase: InterviewPhase, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!("{} failed: {}", phase, reason);
        crate::metrics::PHASE_FAILURES_TOTAL
            .with_label_values(&[phase.as_str()])
            .inc();
        self.failures.push(PhaseFailure { phase, reason });
    }

    /// Count every judged leaf across tools, steps and the plan
    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for card in &self.tool_scorecards {
            tally.add(card.scores());
        }
        if let Some(functional) = &self.functional_test_scorecard {
            for step in &functional.steps {
                tally.add(step.scorecard.scores());
            }
            tally.add(functional.scorecard.scores());
        }
        tally
    }

    /// Compute `score` and `analysis` from the current contents
    pub fn finalize(&mut self) {
        let tally = self.tally();
        self.score = if self.is_unrecoverable() { 0.0 } else { tally.ratio() };
        self.analysis = self.render_analysis(&tally);
        self.finished_at = Utc::now();
    }

    fn render_analysis(&self, tally: &Tally) -> String {
        let mut lines = Vec::new();

        if self.is_unrecoverable() {
            lines.push(format!(
                "The interview of {} could not be completed.",
                self.parameters.display_target()
            ));
        } else {
            let band = ScoreBand::from_score(self.score);
            lines.push(format!(
                "{} scored {:.0}% ({}): {} of {} judged items passed.",
                self.server_name(),
                self.score * 100.0,
                band,
                tally.passed,
                tally.applicable()
            ));
            lines.push(band.summary().to_string());

            let mut counts = format!("Discovered {} tools", self.tools.len());
            if !self.resources.is_empty() || !self.resource_templates.is_empty() {
                counts.push_str(&format!(
                    ", {} resources, {} resource templates",
                    self.resources.len(),
                    self.resource_templates.len()
                ));
            }
            if !self.prompts.is_empty() {
                counts.push_str(&format!(", {} prompts", self.prompts.len()));
            }
            counts.push('.');
            lines.push(counts);

            if let Some(functional) = &self.functional_test_scorecard {
                let succeeded = functional
                    .steps
                    .iter()
                    .filter(|s| s.execution.succeeded())
                    .count();
                lines.push(format!(
                    "{} of {} scenario steps completed without error.",
                    succeeded,
                    functional.steps.len()
                ));
            }

            if tally.not_applicable > 0 {
                lines.push(format!("{} items were not judged.", tally.not_applicable));
            }
        }

        for failure in &self.failures {
            lines.push(format!("{} failed: {}", failure.phase, failure.reason));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ServerParameters {
        ServerParameters::from_target("python server.py").unwrap()
    }

    fn passing_card() -> ToolScoreCard {
        let mut card = ToolScoreCard::not_applicable("unscored");
        card.tool_name.length = Score::pass("short");
        card.tool_name.uniqueness = Score::pass("prefixed");
        card.tool_name.descriptiveness = Score::fail("vague");
        card
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(ScoreBand::from_score(1.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::from_score(0.9), ScoreBand::Excellent);
        assert_eq!(ScoreBand::from_score(0.75), ScoreBand::Good);
        assert_eq!(ScoreBand::from_score(0.5), ScoreBand::Mixed);
        assert_eq!(ScoreBand::from_score(0.2), ScoreBand::Poor);
        assert_eq!(ScoreBand::from_score(0.19), ScoreBand::VeryPoor);
    }

    #[test]
    fn test_not_applicable_excluded_from_ratio() {
        let mut card = ServerScoreCard::new(params(), "gpt-4o");
        card.phase = InterviewPhase::Done;
        card.tool_scorecards = vec![passing_card()];
        card.finalize();

        let tally = card.tally();
        assert_eq!(tally.passed, 2);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.not_applicable, 11);
        assert!((card.score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_nothing_judged_scores_zero() {
        let mut card = ServerScoreCard::new(params(), "gpt-4o");
        card.phase = InterviewPhase::Done;
        card.tool_scorecards = vec![ToolScoreCard::not_applicable("disabled")];
        card.finalize();
        assert_eq!(card.score, 0.0);
    }

    #[test]
    fn test_unrecoverable_failure_forces_zero() {
        let mut card = ServerScoreCard::new(params(), "gpt-4o");
        card.tool_scorecards = vec![passing_card()];
        card.phase = InterviewPhase::Failed;
        card.record_failure(InterviewPhase::Synthesizing, "exceeded maximum retries");
        card.finalize();

        assert_eq!(card.score, 0.0);
        assert!(card.analysis.contains("could not be completed"));
        assert!(card.analysis.contains("synthesizing failed: exceeded maximum retries"));
    }

    #[test]
    fn test_json_round_trip_keeps_shape() {
        let mut card = ServerScoreCard::new(params(), "gpt-4o");
        card.phase = InterviewPhase::Done;
        card.finalize();

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["parameters"]["connection_type"], "stdio");
        assert_eq!(json["phase"], "done");
        assert!(json.get("functional_test_scorecard").is_none());

        let back: ServerScoreCard = serde_json::from_value(json).unwrap();
        assert_eq!(back, card);
    }
}
