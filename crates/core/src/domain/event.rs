// Progress and session events emitted to the outer layer

use super::candidate::{Candidate, Location};
use super::outcome::{FailureReason, ProbeOutcome};

/// One finished probe (one progress unit)
#[derive(Debug, Clone)]
pub enum ProbeEvent {
    Completed { path: String, outcome: ProbeOutcome },
}

/// State transitions of a supervised connection
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connecting { candidate: Candidate },
    Connected {
        candidate: Candidate,
        location: Location,
    },
    Reconnecting {
        candidate: Candidate,
        reason: FailureReason,
    },
    Rotating {
        from: Candidate,
        to: Candidate,
        reason: FailureReason,
    },
    Exhausted { last: Candidate },
    Cancelled,
}
