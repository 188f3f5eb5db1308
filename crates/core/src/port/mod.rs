// Port Layer - Interfaces for external collaborators

pub mod candidate_store;
pub mod location_resolver;
pub mod process_launcher;
pub mod time_provider;

// Re-exports
pub use candidate_store::{CandidateStore, StoreError};
pub use location_resolver::LocationResolver;
pub use process_launcher::{LaunchError, LineStream, ProcessLauncher, TunnelProcess};
pub use time_provider::TimeProvider;
