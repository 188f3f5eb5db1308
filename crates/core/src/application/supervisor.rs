// Persistent Supervisor / Failover Loop
// Holds one tunnel open, retries a dropped candidate once, then rotates

use crate::application::classifier::OutputClassifier;
use crate::application::constants::DEFAULT_ESTABLISH_TIMEOUT;
use crate::application::process_guard::ProcessGuard;
use crate::domain::{
    Candidate, DomainError, FailoverDecision, FailureReason, LaunchSpec, SessionEvent,
    SessionState, DEFAULT_CLIENT_BINARY,
};
use crate::port::{CandidateStore, LineStream, LocationResolver, ProcessLauncher, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Receives one event per state transition
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;

/// Terminal conditions of the failover loop
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("No saved configs left to fail over to (last tried: {0})")]
    CandidatesExhausted(String),

    #[error("Candidate store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Domain(#[from] DomainError),
}

/// Persistent-mode parameters
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub establish_timeout: Duration,
    pub client_binary: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            establish_timeout: DEFAULT_ESTABLISH_TIMEOUT,
            client_binary: DEFAULT_CLIENT_BINARY.to_string(),
        }
    }
}

/// How one supervised connection ended
#[derive(Debug)]
enum ConnectionEnd {
    Failed(FailureReason),
    Cancelled,
}

/// Failover supervisor
///
/// At most one client process is alive at a time; every transition waits for
/// the previous process tree to be gone before relaunching or returning.
pub struct FailoverSupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    resolver: Arc<dyn LocationResolver>,
    store: Arc<dyn CandidateStore>,
    classifier: OutputClassifier,
    config: SupervisorConfig,
    events: Option<SessionEventSender>,
}

impl FailoverSupervisor {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        resolver: Arc<dyn LocationResolver>,
        store: Arc<dyn CandidateStore>,
        classifier: OutputClassifier,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            launcher,
            resolver,
            store,
            classifier,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: SessionEventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the failover loop starting at `start` until cancelled or exhausted
    ///
    /// Returns `Ok(())` on cancellation (saved list untouched) and
    /// `Err(SupervisorError::CandidatesExhausted)` once no saved candidate is
    /// left.
    pub async fn supervise(
        &self,
        start: Candidate,
        cancel: CancellationToken,
    ) -> Result<(), SupervisorError> {
        let mut session = SessionState::new(start);

        loop {
            info!(path = %session.current.path, "Connecting");
            self.emit(SessionEvent::Connecting {
                candidate: session.current.clone(),
            });

            let reason = match self.hold_connection(&mut session, &cancel).await? {
                ConnectionEnd::Failed(reason) if !cancel.is_cancelled() => reason,
                _ => {
                    self.stop(&mut session);
                    return Ok(());
                }
            };

            match session.fail()? {
                FailoverDecision::RetrySame => {
                    warn!(
                        path = %session.current.path,
                        reason = %reason,
                        "Connection failed, retrying same config"
                    );
                    self.emit(SessionEvent::Reconnecting {
                        candidate: session.current.clone(),
                        reason,
                    });
                    session.relaunch(None)?;
                }
                FailoverDecision::Rotate => match self.next_candidate(&session.current).await? {
                    Some(next) => {
                        warn!(
                            from = %session.current.path,
                            to = %next.path,
                            reason = %reason,
                            "Connection failed twice, rotating to next saved config"
                        );
                        self.emit(SessionEvent::Rotating {
                            from: session.current.clone(),
                            to: next.clone(),
                            reason,
                        });
                        session.relaunch(Some(next))?;
                    }
                    None => {
                        session.exhaust()?;
                        warn!(path = %session.current.path, "No saved configs left");
                        self.emit(SessionEvent::Exhausted {
                            last: session.current.clone(),
                        });
                        return Err(SupervisorError::CandidatesExhausted(
                            session.current.path.clone(),
                        ));
                    }
                },
            }
        }
    }

    fn stop(&self, session: &mut SessionState) {
        session.cancel();
        info!(path = %session.current.path, "Supervision cancelled");
        self.emit(SessionEvent::Cancelled);
    }

    /// Drop `current` from the saved list and pick the first remaining entry
    async fn next_candidate(
        &self,
        current: &Candidate,
    ) -> Result<Option<Candidate>, SupervisorError> {
        let mut saved = match self.store.load().await {
            Ok(saved) => saved,
            Err(StoreError::NoHistory) => {
                warn!("No saved config history to fail over to");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        saved.retain(|c| !c.matches_path(&current.path));
        self.store.save(&saved).await?;
        Ok(saved.into_iter().next())
    }

    /// One launch: connect, hold, tear down. Never leaves the process running.
    async fn hold_connection(
        &self,
        session: &mut SessionState,
        cancel: &CancellationToken,
    ) -> Result<ConnectionEnd, SupervisorError> {
        let path = session.current.path.clone();
        let spec = LaunchSpec::connect(&self.config.client_binary, &path);

        let process = match self.launcher.launch(&spec).await {
            Ok(process) => process,
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to launch client");
                return Ok(ConnectionEnd::Failed(FailureReason::SpawnFailed(e.to_string())));
            }
        };

        let mut guard = ProcessGuard::new(process, path.as_str());
        let end = match guard.take_output() {
            None => Ok(ConnectionEnd::Failed(FailureReason::StreamUnavailable)),
            Some(lines) => self.watch(session, lines, cancel).await,
        };

        if let Err(e) = guard.release().await {
            warn!(path = %path, error = %e, "Client process tree termination failed");
        }
        end
    }

    async fn watch(
        &self,
        session: &mut SessionState,
        lines: LineStream,
        cancel: &CancellationToken,
    ) -> Result<ConnectionEnd, SupervisorError> {
        let path = session.current.path.clone();
        let mut scan = self.classifier.spawn_monitor(lines, &path);

        // Connecting
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(ConnectionEnd::Cancelled),
            Ok(()) = &mut scan.connected => {}
            reason = &mut scan.failure => {
                return Ok(ConnectionEnd::Failed(
                    reason.unwrap_or(FailureReason::ProcessExitedUnexpectedly),
                ));
            }
            _ = tokio::time::sleep(self.config.establish_timeout) => {
                warn!(
                    path = %path,
                    timeout_secs = self.config.establish_timeout.as_secs_f64(),
                    "Connection not established in time"
                );
                return Ok(ConnectionEnd::Failed(FailureReason::Timeout));
            }
        }

        let location = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(ConnectionEnd::Cancelled),
            location = self.resolver.resolve(&path) => location,
        };
        session.connect(location.clone())?;
        info!(path = %path, location = %location, "Connected");
        self.emit(SessionEvent::Connected {
            candidate: session.current.clone(),
            location,
        });

        // Connected: the same stream keeps being watched for failure
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(ConnectionEnd::Cancelled),
            reason = &mut scan.failure => Ok(ConnectionEnd::Failed(
                reason.unwrap_or(FailureReason::ProcessExitedUnexpectedly),
            )),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
