//! MCP Interviewer Library
//!
//! Connects to a Model Context Protocol server, discovers what it offers,
//! has an LLM judge its tools, runs a synthesized scenario against it, scores
//! the results, and checks the outcome against client-side constraints.

pub mod config;
pub mod constraints;
pub mod error;
pub mod interview;
pub mod mcp;
pub mod metrics;
pub mod report;

pub use constraints::{Constraint, ConstraintSet, Severity, Violation};
pub use error::{InterviewError, JudgeError, PhaseElapsed, SessionError};
pub use interview::{Interviewer, ServerScoreCard};
pub use mcp::ServerParameters;
