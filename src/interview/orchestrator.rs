//! The interview engine.
//!
//! Drives one server through every phase:
//!
//! ```text
//! Idle -> Connecting -> Negotiated -> Enumerating -> ScoringTools
//!      -> Synthesizing -> Executing -> ScoringResults -> Done
//! ```
//!
//! Every phase after connecting has its own budget. Only a failure to
//! connect or negotiate aborts the interview; everything else is recorded on
//! the scorecard and the engine moves on with whatever it has.

use crate::error::InterviewError;
use crate::interview::enumerate::{enumerate_into, Inventory};
use crate::interview::judge::{ChatModel, JudgeClient};
use crate::interview::rubric::{Rubric, ToolScoreCard};
use crate::interview::scenario::{self, ExecutionReport};
use crate::interview::scorecard::ServerScoreCard;
use crate::interview::scoring::{score_results, score_tools};
use crate::interview::session::{Session, SessionFactory};
use crate::interview::timeout::PhaseTimeout;
use crate::mcp::params::ServerParameters;
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::Instrument;

/// Where an interview is, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPhase {
    Idle,
    Connecting,
    Negotiated,
    Enumerating,
    ScoringTools,
    Synthesizing,
    Executing,
    ScoringResults,
    Done,
    Failed,
}

impl InterviewPhase {
    /// Metric label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Negotiated => "negotiated",
            Self::Enumerating => "enumerating",
            Self::ScoringTools => "scoring_tools",
            Self::Synthesizing => "synthesizing",
            Self::Executing => "executing",
            Self::ScoringResults => "scoring_results",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InterviewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().replace('_', " "))
    }
}

/// Which judge-backed phases run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterviewOptions {
    pub score_tools: bool,
    pub score_results: bool,
}

impl Default for InterviewOptions {
    fn default() -> Self {
        Self {
            score_tools: true,
            score_results: true,
        }
    }
}

/// Per-phase budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterviewTimeouts {
    /// Opening the transport and negotiating
    pub connect: Duration,
    /// Each listing page
    pub list: Duration,
    /// Each scenario tool call
    pub call: Duration,
    /// Tool scoring, per tool
    pub tool: Duration,
    /// Enumeration and scenario execution, each as a whole
    pub server: Duration,
    /// Each judge analysis call (synthesis, step and plan scoring)
    pub analysis: Duration,
}

impl Default for InterviewTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            list: Duration::from_secs(30),
            call: Duration::from_secs(30),
            tool: Duration::from_secs(30),
            server: Duration::from_secs(300),
            analysis: Duration::from_secs(60),
        }
    }
}

/// Interviews servers opened through `F`, judged by `M`
pub struct Interviewer<F, M> {
    factory: F,
    judge: JudgeClient<M>,
    options: InterviewOptions,
    timeouts: InterviewTimeouts,
}

impl<F: SessionFactory, M: ChatModel> Interviewer<F, M> {
    pub fn new(factory: F, judge: JudgeClient<M>) -> Self {
        Self {
            factory,
            judge,
            options: InterviewOptions::default(),
            timeouts: InterviewTimeouts::default(),
        }
    }

    pub fn with_options(mut self, options: InterviewOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeouts(mut self, timeouts: InterviewTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn judge(&self) -> &JudgeClient<M> {
        &self.judge
    }

    /// Interview one server, never failing
    ///
    /// When the server cannot be reached the scorecard has a zero score, no
    /// tools, and the connection error in its failures and analysis.
    pub async fn interview(&self, params: &ServerParameters) -> ServerScoreCard {
        let mut card = ServerScoreCard::new(params.clone(), self.judge.model_name());
        let span = tracing::info_span!("interview", id = %card.interview_id);

        async {
            if let Err(e) = self.run(&mut card).await {
                card.record_failure(e.phase(), e.to_string());
                card.phase = InterviewPhase::Failed;
            }
            self.finish(&mut card);
        }
        .instrument(span)
        .await;

        card
    }

    /// Interview one server, failing only if it cannot be reached
    ///
    /// # Errors
    ///
    /// [`InterviewError`] when connecting or negotiating fails or times out.
    pub async fn try_interview(
        &self,
        params: &ServerParameters,
    ) -> Result<ServerScoreCard, InterviewError> {
        let mut card = ServerScoreCard::new(params.clone(), self.judge.model_name());
        let span = tracing::info_span!("interview", id = %card.interview_id);

        async {
            match self.run(&mut card).await {
                Ok(()) => {
                    self.finish(&mut card);
                    Ok(())
                }
                Err(e) => {
                    metrics::INTERVIEWS_TOTAL.with_label_values(&["unreachable"]).inc();
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await?;

        Ok(card)
    }

    fn finish(&self, card: &mut ServerScoreCard) {
        card.finalize();
        let outcome = if card.is_unrecoverable() {
            "failed"
        } else if card.failures.is_empty() {
            "completed"
        } else {
            "partial"
        };
        metrics::INTERVIEWS_TOTAL.with_label_values(&[outcome]).inc();
        tracing::info!(
            "Interview finished ({}): score {:.2}, {} failures",
            outcome,
            card.score,
            card.failures.len()
        );
    }

    async fn run(&self, card: &mut ServerScoreCard) -> Result<(), InterviewError> {
        enter(card, InterviewPhase::Connecting);
        let connect = PhaseTimeout::new(InterviewPhase::Connecting, self.timeouts.connect);

        let mut session = connect
            .run(self.factory.connect(&card.parameters))
            .await?
            .map_err(InterviewError::Connect)?;

        let negotiate = PhaseTimeout::new(InterviewPhase::Negotiated, self.timeouts.connect);
        let negotiated = match negotiate.run(session.negotiate()).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                session.close().await;
                return Err(InterviewError::Negotiate(e));
            }
            Err(elapsed) => {
                session.close().await;
                return Err(elapsed.into());
            }
        };
        tracing::info!(
            "Negotiated with {} {} (protocol {})",
            negotiated.server_info.name,
            negotiated.server_info.version,
            negotiated.protocol_version
        );
        let capabilities = negotiated.capabilities.clone();
        card.initialize_result = Some(negotiated);
        enter(card, InterviewPhase::Negotiated);

        enter(card, InterviewPhase::Enumerating);
        let mut inventory = Inventory::default();
        let mut listing_failures = Vec::new();
        let listing = PhaseTimeout::new(InterviewPhase::Enumerating, self.timeouts.server)
            .run(enumerate_into(
                &mut session,
                &capabilities,
                self.timeouts.list,
                &mut inventory,
                &mut listing_failures,
            ))
            .await;
        for failure in listing_failures {
            card.record_failure(
                InterviewPhase::Enumerating,
                format!("Failed to list {}: {}", failure.kind, failure.reason),
            );
        }
        if let Err(elapsed) = listing {
            card.record_failure(
                elapsed.phase,
                format!("{} (keeping {} tools)", elapsed, inventory.tools.len()),
            );
        }
        card.tools = inventory.tools;
        card.resources = inventory.resources;
        card.resource_templates = inventory.resource_templates;
        card.prompts = inventory.prompts;

        enter(card, InterviewPhase::ScoringTools);
        let budget = PhaseTimeout::scaled(
            InterviewPhase::ScoringTools,
            self.timeouts.tool,
            card.tools.len(),
        );
        let scored = budget
            .run(score_tools(&self.judge, &card.tools, self.options.score_tools))
            .await;
        card.tool_scorecards = match scored {
            Ok(scorecards) => scorecards,
            Err(elapsed) => {
                card.record_failure(elapsed.phase, elapsed.to_string());
                let reason = format!("Scoring failed: {}", elapsed);
                card.tools
                    .iter()
                    .map(|_| ToolScoreCard::not_applicable(&reason))
                    .collect()
            }
        };

        if card.tools.is_empty() {
            tracing::info!("Server exposes no tools, skipping the functional test");
            session.close().await;
            enter(card, InterviewPhase::Done);
            return Ok(());
        }

        enter(card, InterviewPhase::Synthesizing);
        let synthesis = PhaseTimeout::new(InterviewPhase::Synthesizing, self.timeouts.analysis)
            .run(scenario::synthesize(&self.judge, &card.tools))
            .await;
        let plan = match synthesis {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                card.record_failure(InterviewPhase::Synthesizing, e.to_string());
                return self.abandon(card, session).await;
            }
            Err(elapsed) => {
                card.record_failure(elapsed.phase, elapsed.to_string());
                return self.abandon(card, session).await;
            }
        };

        enter(card, InterviewPhase::Executing);
        let mut report = ExecutionReport::default();
        let execution = PhaseTimeout::new(InterviewPhase::Executing, self.timeouts.server)
            .run(scenario::execute_into(
                &mut session,
                &plan,
                self.timeouts.call,
                &mut report,
            ))
            .await;
        if let Err(elapsed) = execution {
            report.aborted = Some(elapsed.to_string());
        }
        if let Some(reason) = &report.aborted {
            card.record_failure(
                InterviewPhase::Executing,
                format!(
                    "Scenario stopped after {} of {} steps: {}",
                    report.steps.len(),
                    plan.steps.len(),
                    reason
                ),
            );
        }
        session.close().await;

        enter(card, InterviewPhase::ScoringResults);
        let functional = score_results(
            &self.judge,
            plan,
            report,
            &card.tools,
            self.options.score_results,
            self.timeouts.analysis,
        )
        .await;
        card.functional_test_scorecard = Some(functional);

        enter(card, InterviewPhase::Done);
        Ok(())
    }

    /// Stop after an unrecoverable failure past the connection phases
    async fn abandon<S: Session>(
        &self,
        card: &mut ServerScoreCard,
        mut session: S,
    ) -> Result<(), InterviewError> {
        session.close().await;
        enter(card, InterviewPhase::Failed);
        Ok(())
    }
}

fn enter(card: &mut ServerScoreCard, phase: InterviewPhase) {
    tracing::info!("Entering phase: {}", phase);
    card.phase = phase;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display_and_labels() {
        assert_eq!(InterviewPhase::ScoringTools.to_string(), "scoring tools");
        assert_eq!(InterviewPhase::ScoringTools.as_str(), "scoring_tools");
        assert_eq!(
            serde_json::to_value(InterviewPhase::ScoringResults).unwrap(),
            "scoring_results"
        );
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = InterviewTimeouts::default();
        assert_eq!(timeouts.server, Duration::from_secs(300));
        assert_eq!(timeouts.analysis, Duration::from_secs(60));
        assert_eq!(timeouts.tool, Duration::from_secs(30));
    }
}
