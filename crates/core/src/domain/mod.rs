// Domain Layer - Pure types and state rules

pub mod candidate;
pub mod error;
pub mod event;
pub mod launch;
pub mod outcome;
pub mod session;
pub mod signal;

// Re-exports
pub use candidate::{Candidate, Location};
pub use error::DomainError;
pub use event::{ProbeEvent, SessionEvent};
pub use launch::{LaunchMode, LaunchSpec, DEFAULT_CLIENT_BINARY};
pub use outcome::{FailureReason, ProbeOutcome};
pub use session::{ConnectionState, FailoverDecision, SessionState};
pub use signal::{LineSignal, SignalVocabulary};
