// Output Classifier
// Turns a child's merged output into one terminal outcome, as early as possible

use crate::domain::{FailureReason, LineSignal, ProbeOutcome, SignalVocabulary};
use crate::port::LineStream;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Line classifier shared by the prober and the supervisor
///
/// Each scan runs on its own task and reports through a oneshot, so the
/// first signal wins and anything after it is dropped. Within a single line
/// the success phrase takes priority over failure keywords.
#[derive(Clone)]
pub struct OutputClassifier {
    vocabulary: Arc<SignalVocabulary>,
    verbose: bool,
}

/// Running batch-mode scan
pub struct ProbeScan {
    verdict: oneshot::Receiver<ProbeOutcome>,
    task: JoinHandle<()>,
}

impl ProbeScan {
    /// Wait for the terminal outcome
    ///
    /// Resolves once; a scan task that vanished without answering counts as
    /// an unexpected exit.
    pub async fn verdict(&mut self) -> ProbeOutcome {
        (&mut self.verdict)
            .await
            .unwrap_or(ProbeOutcome::Failure(FailureReason::ProcessExitedUnexpectedly))
    }
}

impl Drop for ProbeScan {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Running persistent-mode scan
///
/// `connected` fires at most once, on the first success phrase. `failure`
/// carries the terminal reason; scanning continues after `connected`.
/// Each receiver must be awaited at most until it resolves.
pub struct MonitorScan {
    pub connected: oneshot::Receiver<()>,
    pub failure: oneshot::Receiver<FailureReason>,
    task: JoinHandle<()>,
}

impl Drop for MonitorScan {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl OutputClassifier {
    pub fn new(vocabulary: SignalVocabulary, verbose: bool) -> Self {
        Self {
            vocabulary: Arc::new(vocabulary),
            verbose,
        }
    }

    /// Classify one raw line (trimmed before matching)
    pub fn classify(&self, raw: &str, watch_restart: bool) -> Option<LineSignal> {
        self.vocabulary.match_line(raw.trim(), watch_restart)
    }

    /// Start a batch-mode scan: success, failure keyword, or end of stream
    pub fn spawn_probe(&self, lines: LineStream, label: &str) -> ProbeScan {
        let (tx, rx) = oneshot::channel();
        let classifier = self.clone();
        let label = label.to_string();

        let task = tokio::spawn(async move {
            let outcome = classifier.scan_probe(lines, &label).await;
            // Receiver gone means the probe already settled (timeout/cancel)
            let _ = tx.send(outcome);
        });

        ProbeScan { verdict: rx, task }
    }

    /// Start a persistent-mode scan that also watches the restart phrase
    pub fn spawn_monitor(&self, lines: LineStream, label: &str) -> MonitorScan {
        let (connected_tx, connected_rx) = oneshot::channel();
        let (failure_tx, failure_rx) = oneshot::channel();
        let classifier = self.clone();
        let label = label.to_string();

        let task = tokio::spawn(async move {
            let reason = classifier.scan_monitor(lines, &label, connected_tx).await;
            let _ = failure_tx.send(reason);
        });

        MonitorScan {
            connected: connected_rx,
            failure: failure_rx,
            task,
        }
    }

    async fn scan_probe(&self, mut lines: LineStream, label: &str) -> ProbeOutcome {
        while let Some(raw) = lines.recv().await {
            self.echo(label, &raw);
            match self.classify(&raw, false) {
                Some(LineSignal::Success) => return ProbeOutcome::Success,
                Some(LineSignal::Failure(keyword)) => {
                    debug!(path = %label, keyword = %keyword, "Failure keyword matched");
                    return ProbeOutcome::Failure(FailureReason::KeywordMatch(keyword));
                }
                Some(LineSignal::RestartPause) | None => {}
            }
        }
        ProbeOutcome::Failure(FailureReason::ProcessExitedUnexpectedly)
    }

    async fn scan_monitor(
        &self,
        mut lines: LineStream,
        label: &str,
        connected_tx: oneshot::Sender<()>,
    ) -> FailureReason {
        let mut connected_tx = Some(connected_tx);

        while let Some(raw) = lines.recv().await {
            self.echo(label, &raw);
            match self.classify(&raw, true) {
                Some(LineSignal::Success) => {
                    if let Some(tx) = connected_tx.take() {
                        let _ = tx.send(());
                    }
                }
                Some(LineSignal::Failure(keyword)) => {
                    debug!(path = %label, keyword = %keyword, "Failure keyword matched");
                    return FailureReason::KeywordMatch(keyword);
                }
                Some(LineSignal::RestartPause) => return FailureReason::RestartPause,
                None => {}
            }
        }
        FailureReason::ProcessExitedUnexpectedly
    }

    fn echo(&self, label: &str, raw: &str) {
        if self.verbose {
            debug!(path = %label, line = %raw.trim_end(), "client output");
        } else {
            trace!(path = %label, line = %raw.trim_end(), "client output");
        }
    }
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::new(SignalVocabulary::default(), false)
    }
}
