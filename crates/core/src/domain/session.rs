// Session Domain Model (persistent mode)

use super::candidate::{Candidate, Location};
use super::error::{DomainError, Result};

/// Connection state of a supervised session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Failed,
    Cancelled,
    Terminal,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Failed => write!(f, "FAILED"),
            ConnectionState::Cancelled => write!(f, "CANCELLED"),
            ConnectionState::Terminal => write!(f, "TERMINAL"),
        }
    }
}

/// What the failover loop does after a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverDecision {
    /// First failure since the last good connection: relaunch the same candidate
    RetrySame,
    /// Second consecutive failure: drop the candidate and move on
    Rotate,
}

/// Session State
///
/// Passed explicitly through the failover loop; nothing else mutates it.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub current: Candidate,
    pub retry_attempted: bool,
    pub state: ConnectionState,
}

impl SessionState {
    pub fn new(start: Candidate) -> Self {
        Self {
            current: start,
            retry_attempted: false,
            state: ConnectionState::Connecting,
        }
    }

    /// Connecting -> Connected; clears the retry flag
    pub fn connect(&mut self, location: Location) -> Result<()> {
        self.transition(ConnectionState::Connected, &[ConnectionState::Connecting])?;
        self.current = self.current.located(location);
        self.retry_attempted = false;
        Ok(())
    }

    /// Connecting|Connected -> Failed, returning the next move
    pub fn fail(&mut self) -> Result<FailoverDecision> {
        self.transition(
            ConnectionState::Failed,
            &[ConnectionState::Connecting, ConnectionState::Connected],
        )?;
        if self.retry_attempted {
            self.retry_attempted = false;
            Ok(FailoverDecision::Rotate)
        } else {
            self.retry_attempted = true;
            Ok(FailoverDecision::RetrySame)
        }
    }

    /// Failed -> Connecting on the same or on a new candidate
    pub fn relaunch(&mut self, next: Option<Candidate>) -> Result<()> {
        self.transition(ConnectionState::Connecting, &[ConnectionState::Failed])?;
        if let Some(candidate) = next {
            self.current = candidate;
        }
        Ok(())
    }

    /// Any live state -> Cancelled
    pub fn cancel(&mut self) {
        self.state = ConnectionState::Cancelled;
    }

    /// Failed -> Terminal (candidate list exhausted)
    pub fn exhaust(&mut self) -> Result<()> {
        self.transition(ConnectionState::Terminal, &[ConnectionState::Failed])
    }

    fn transition(&mut self, to: ConnectionState, allowed_from: &[ConnectionState]) -> Result<()> {
        if !allowed_from.contains(&self.state) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}
