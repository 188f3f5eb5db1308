// Application Layer - Classifier, Prober, Failover Supervisor

pub mod classifier;
pub mod constants;
pub mod process_guard;
pub mod prober;
pub mod supervisor;

// Re-exports
pub use classifier::{MonitorScan, OutputClassifier, ProbeScan};
pub use process_guard::ProcessGuard;
pub use prober::{ProbeConfig, Prober, ProgressSender};
pub use supervisor::{FailoverSupervisor, SessionEventSender, SupervisorConfig, SupervisorError};
