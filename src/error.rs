//! Error types shared across the interviewer.
//!
//! Each layer has its own enum so callers can tell transport faults from
//! server-side errors and judge failures without string matching.

use crate::interview::orchestrator::InterviewPhase;
use crate::mcp::protocol::McpError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single session operation (negotiate, list, call)
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport failed to carry this exchange. Whether the session
    /// survives is up to the transport; see `Session::is_usable`.
    #[error("transport failure: {0:#}")]
    Transport(#[from] anyhow::Error),

    /// The server answered with a JSON-RPC error object
    #[error("server error: {0}")]
    Rpc(McpError),

    #[error("invalid {method} response: {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error("session already negotiated")]
    AlreadyNegotiated,

    #[error("session not negotiated")]
    NotNegotiated,
}

impl SessionError {
    /// Whether this error means the channel to the server is gone
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Failure of one structured judge completion
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("completion request failed: {0:#}")]
    Completion(#[source] anyhow::Error),

    #[error("chat completion content was empty")]
    EmptyCompletion,

    #[error("exceeded maximum retries ({attempts} attempts): {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },
}

/// A phase ran past its budget
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{phase} timed out after {} seconds", after.as_secs())]
pub struct PhaseElapsed {
    pub phase: InterviewPhase,
    pub after: Duration,
}

/// The only failures that abort an interview outright
#[derive(Debug, Error)]
pub enum InterviewError {
    #[error("failed to connect to server: {0:#}")]
    Connect(#[source] anyhow::Error),

    #[error("failed to negotiate session: {0}")]
    Negotiate(#[source] SessionError),

    #[error(transparent)]
    Timeout(#[from] PhaseElapsed),
}

impl InterviewError {
    /// The phase the interview stopped in
    pub fn phase(&self) -> InterviewPhase {
        match self {
            Self::Connect(_) => InterviewPhase::Connecting,
            Self::Negotiate(_) => InterviewPhase::Negotiated,
            Self::Timeout(elapsed) => elapsed.phase,
        }
    }
}
