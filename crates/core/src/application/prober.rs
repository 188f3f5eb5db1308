// Bounded Concurrent Prober
// Tests many configs in parallel, stops early once enough of them work

use crate::application::classifier::OutputClassifier;
use crate::application::constants::{
    DEFAULT_MAX_WORKERS, DEFAULT_PROBE_TIMEOUT, DEFAULT_SUCCESS_LIMIT,
};
use crate::application::process_guard::ProcessGuard;
use crate::domain::{
    Candidate, FailureReason, LaunchSpec, Location, ProbeEvent, ProbeOutcome, DEFAULT_CLIENT_BINARY,
};
use crate::port::{LaunchError, LocationResolver, ProcessLauncher, TimeProvider};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives exactly one event per input path
pub type ProgressSender = mpsc::UnboundedSender<ProbeEvent>;

/// Batch probing parameters
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub max_workers: usize,
    pub success_limit: usize,
    pub per_probe_timeout: Duration,
    pub client_binary: String,
}

impl ProbeConfig {
    /// Worker bound actually used for `candidates` inputs (1..=candidates)
    pub fn effective_workers(&self, candidates: usize) -> usize {
        self.max_workers.clamp(1, candidates.max(1))
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            success_limit: DEFAULT_SUCCESS_LIMIT,
            per_probe_timeout: DEFAULT_PROBE_TIMEOUT,
            client_binary: DEFAULT_CLIENT_BINARY.to_string(),
        }
    }
}

/// Bounded concurrent prober
pub struct Prober {
    launcher: Arc<dyn ProcessLauncher>,
    resolver: Arc<dyn LocationResolver>,
    classifier: OutputClassifier,
    time_provider: Arc<dyn TimeProvider>,
}

/// State shared by all probe tasks of one run
struct ProbeRun {
    launcher: Arc<dyn ProcessLauncher>,
    resolver: Arc<dyn LocationResolver>,
    classifier: OutputClassifier,
    time_provider: Arc<dyn TimeProvider>,
    config: ProbeConfig,
    /// Child of the caller's token; cancelled once the limit is reached
    limit_token: CancellationToken,
    accepted: Mutex<Vec<Candidate>>,
    progress: Option<ProgressSender>,
}

impl Prober {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        resolver: Arc<dyn LocationResolver>,
        classifier: OutputClassifier,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            launcher,
            resolver,
            classifier,
            time_provider,
        }
    }

    /// Probe every path and return the working ones
    ///
    /// Results are in completion order, each with a resolved location, and
    /// never more than `config.success_limit`. Reaching the limit cancels
    /// in-flight probes and stops scheduling new ones. Cancelling `cancel`
    /// does the same for the whole run.
    ///
    /// # Example
    /// ```ignore
    /// let found = prober
    ///     .probe_all(paths, &ProbeConfig::default(), CancellationToken::new(), None)
    ///     .await;
    /// ```
    pub async fn probe_all(
        &self,
        paths: Vec<String>,
        config: &ProbeConfig,
        cancel: CancellationToken,
        progress: Option<ProgressSender>,
    ) -> Vec<Candidate> {
        if paths.is_empty() || config.success_limit == 0 {
            info!(
                candidates = paths.len(),
                success_limit = config.success_limit,
                "Nothing to probe"
            );
            return Vec::new();
        }

        let workers = config.effective_workers(paths.len());
        info!(
            candidates = paths.len(),
            workers = workers,
            success_limit = config.success_limit,
            timeout_secs = config.per_probe_timeout.as_secs_f64(),
            "Starting probe run"
        );

        let run = Arc::new(ProbeRun {
            launcher: Arc::clone(&self.launcher),
            resolver: Arc::clone(&self.resolver),
            classifier: self.classifier.clone(),
            time_provider: Arc::clone(&self.time_provider),
            config: config.clone(),
            limit_token: cancel.child_token(),
            accepted: Mutex::new(Vec::with_capacity(config.success_limit.min(paths.len()))),
            progress,
        });

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();

        let mut pending = paths.into_iter();
        for path in pending.by_ref() {
            let permit = tokio::select! {
                biased;
                _ = run.limit_token.cancelled() => {
                    run.report(path, ProbeOutcome::Failure(FailureReason::Cancelled));
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        run.report(path, ProbeOutcome::Failure(FailureReason::Cancelled));
                        break;
                    }
                },
            };

            let run = Arc::clone(&run);
            set.spawn(async move {
                // Held until the process tree is gone
                let _permit = permit;
                run.probe_and_record(path).await;
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!(error = ?e, "Probe task panicked");
                } else {
                    error!(error = ?e, "Probe task cancelled");
                }
            }
        }

        // Never scheduled
        for path in pending {
            run.report(path, ProbeOutcome::Failure(FailureReason::Cancelled));
        }

        let mut accepted = run.accepted.lock().unwrap_or_else(PoisonError::into_inner);
        let found = std::mem::take(&mut *accepted);
        drop(accepted);
        info!(found = found.len(), "Probe run finished");
        found
    }
}

impl ProbeRun {
    async fn probe_and_record(&self, path: String) {
        if self.limit_token.is_cancelled() {
            self.report(path, ProbeOutcome::Failure(FailureReason::Cancelled));
            return;
        }

        let started = self.time_provider.now_millis();
        let outcome = self.probe_one(&path).await;
        let duration_ms = self.time_provider.elapsed_millis(started);

        match &outcome {
            ProbeOutcome::Success => match self.reserve_slot(&path) {
                Some(slot) => {
                    let location = self.resolver.resolve(&path).await;
                    info!(
                        path = %path,
                        location = %location,
                        duration_ms = %duration_ms,
                        "Probe succeeded"
                    );
                    self.fill_slot(slot, location);
                }
                None => debug!(path = %path, "Probe succeeded after limit was reached, discarded"),
            },
            ProbeOutcome::Failure(reason) => {
                debug!(path = %path, reason = %reason, duration_ms = %duration_ms, "Probe failed");
            }
        }

        self.report(path, outcome);
    }

    fn report(&self, path: String, outcome: ProbeOutcome) {
        if let Some(progress) = &self.progress {
            let _ = progress.send(ProbeEvent::Completed { path, outcome });
        }
    }

    /// Launch, classify, race against timeout/cancellation, always tear down
    async fn probe_one(&self, path: &str) -> ProbeOutcome {
        let spec = LaunchSpec::probe(&self.config.client_binary, path);
        let process = match self.launcher.launch(&spec).await {
            Ok(process) => process,
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to launch client");
                return ProbeOutcome::Failure(match e {
                    LaunchError::StreamUnavailable => FailureReason::StreamUnavailable,
                    other => FailureReason::SpawnFailed(other.to_string()),
                });
            }
        };

        let mut guard = ProcessGuard::new(process, path);
        let outcome = match guard.take_output() {
            None => ProbeOutcome::Failure(FailureReason::StreamUnavailable),
            Some(lines) => {
                let mut scan = self.classifier.spawn_probe(lines, path);
                tokio::select! {
                    biased;
                    _ = self.limit_token.cancelled() => {
                        ProbeOutcome::Failure(FailureReason::Cancelled)
                    }
                    outcome = scan.verdict() => outcome,
                    _ = tokio::time::sleep(self.config.per_probe_timeout) => {
                        ProbeOutcome::Failure(FailureReason::Timeout)
                    }
                }
            }
        };

        if let Err(e) = guard.release().await {
            warn!(path = %path, error = %e, "Client process tree termination failed");
        }
        outcome
    }

    /// Check-then-append under one lock; cancels the run when the limit is hit
    fn reserve_slot(&self, path: &str) -> Option<usize> {
        let mut accepted = self.accepted.lock().unwrap_or_else(PoisonError::into_inner);
        if accepted.len() >= self.config.success_limit {
            return None;
        }

        accepted.push(Candidate::new(path));
        if accepted.len() >= self.config.success_limit {
            info!(
                success_limit = self.config.success_limit,
                "Success limit reached, cancelling remaining probes"
            );
            self.limit_token.cancel();
        }
        Some(accepted.len() - 1)
    }

    fn fill_slot(&self, slot: usize, location: Location) {
        let mut accepted = self.accepted.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(candidate) = accepted.get_mut(slot) {
            *candidate = candidate.located(location);
        }
    }
}
