//! Phase Timeout Management
//!
//! Every interview phase after connecting runs under its own budget so a
//! slow or silent server can never hang the interviewer.

use crate::error::PhaseElapsed;
use crate::interview::orchestrator::InterviewPhase;
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Budget for one interview phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeout {
    phase: InterviewPhase,
    duration: Duration,
}

impl PhaseTimeout {
    pub fn new(phase: InterviewPhase, duration: Duration) -> Self {
        Self { phase, duration }
    }

    /// Create a timeout from seconds
    pub fn from_secs(phase: InterviewPhase, secs: u64) -> Self {
        Self::new(phase, Duration::from_secs(secs))
    }

    /// Budget for tool scoring: `per_tool` for each tool, at least one unit
    pub fn scaled(phase: InterviewPhase, per_tool: Duration, tools: usize) -> Self {
        let units = u32::try_from(tools.max(1)).unwrap_or(u32::MAX);
        Self::new(phase, per_tool.saturating_mul(units))
    }

    pub fn phase(&self) -> InterviewPhase {
        self.phase
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Drive a future to completion or to the end of the budget
    ///
    /// On expiry the future is dropped; whatever it had in flight is
    /// abandoned.
    pub async fn run<F, T>(&self, future: F) -> Result<T, PhaseElapsed>
    where
        F: Future<Output = T>,
    {
        time::timeout(self.duration, future)
            .await
            .map_err(|_| PhaseElapsed {
                phase: self.phase,
                after: self.duration,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secs() {
        let timeout = PhaseTimeout::from_secs(InterviewPhase::Synthesizing, 60);
        assert_eq!(timeout.duration(), Duration::from_secs(60));
        assert_eq!(timeout.phase(), InterviewPhase::Synthesizing);
    }

    #[test]
    fn test_scaled_by_tool_count() {
        let per_tool = Duration::from_secs(30);
        assert_eq!(
            PhaseTimeout::scaled(InterviewPhase::ScoringTools, per_tool, 4).duration(),
            Duration::from_secs(120)
        );
        // An empty tool list still gets one unit
        assert_eq!(
            PhaseTimeout::scaled(InterviewPhase::ScoringTools, per_tool, 0).duration(),
            per_tool
        );
    }

    #[tokio::test]
    async fn test_run_success() {
        let timeout = PhaseTimeout::from_secs(InterviewPhase::Enumerating, 5);
        let value = timeout.run(async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_expires() {
        let timeout = PhaseTimeout::new(InterviewPhase::Executing, Duration::from_millis(50));
        let err = timeout
            .run(time::sleep(Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert_eq!(err.phase, InterviewPhase::Executing);
        assert_eq!(err.after, Duration::from_millis(50));
    }
}
