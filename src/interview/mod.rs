//! Interview engine
//!
//! Everything between "here is a server" and "here is its scorecard":
//! session handling, capability enumeration, judge-backed scoring, scenario
//! synthesis and execution, and the orchestrator that runs the phases under
//! their time budgets.

pub mod callbacks;
pub mod enumerate;
pub mod judge;
pub mod openai;
pub mod orchestrator;
pub mod prompts;
pub mod rubric;
pub mod scenario;
pub mod scorecard;
pub mod scoring;
pub mod session;
pub mod timeout;

#[cfg(test)]
mod proptests;

pub use callbacks::{CallbackMultiplexer, RequestCounts};
pub use judge::{ChatMessage, ChatModel, JudgeClient, Role};
pub use openai::{OpenAiChatModel, OpenAiConfig};
pub use orchestrator::{InterviewOptions, InterviewPhase, InterviewTimeouts, Interviewer};
pub use rubric::{
    ErrorCategory, PlanScoreCard, Rubric, Score, StepScoreCard, ToolScoreCard, Verdict,
};
pub use scenario::{PlanStep, ScenarioPlan, StepExecution};
pub use scorecard::{FunctionalTestScoreCard, PhaseFailure, ScoreBand, ScoredStep, ServerScoreCard};
pub use session::{McpSessionFactory, Session, SessionFactory};
