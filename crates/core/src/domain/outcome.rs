// Probe Outcome Domain Model

use serde::{Deserialize, Serialize};

/// Why a launch did not produce a working tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// A failure keyword appeared in the client output
    KeywordMatch(String),
    /// The client announced its own restart loop
    RestartPause,
    /// No verdict before the deadline
    Timeout,
    /// Output ended without any recognised signal
    ProcessExitedUnexpectedly,
    /// External cancellation or the success limit was reached
    Cancelled,
    /// The client executable could not be launched
    SpawnFailed(String),
    /// The client output could not be attached
    StreamUnavailable,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::KeywordMatch(keyword) => write!(f, "error keyword found: {}", keyword),
            FailureReason::RestartPause => write!(f, "restart pause detected"),
            FailureReason::Timeout => write!(f, "timed out"),
            FailureReason::ProcessExitedUnexpectedly => write!(f, "process exited unexpectedly"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::SpawnFailed(msg) => write!(f, "spawn failed: {}", msg),
            FailureReason::StreamUnavailable => write!(f, "output stream unavailable"),
        }
    }
}

/// Terminal result of one process launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeOutcome {
    Success,
    Failure(FailureReason),
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Success => write!(f, "SUCCESS"),
            ProbeOutcome::Failure(reason) => write!(f, "FAILED ({})", reason),
        }
    }
}
