// Subcommand runners: composition of the ports with their adapters

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vmate_core::application::{FailoverSupervisor, OutputClassifier, Prober, SupervisorError};
use vmate_core::domain::{Candidate, SessionEvent, SignalVocabulary};
use vmate_core::port::time_provider::SystemTimeProvider;
use vmate_core::port::{CandidateStore, StoreError};
use vmate_infra_fs::{discover_configs, modify_configs, FlatFileCandidateStore};
use vmate_infra_system::{IpInfoResolver, SubprocessLauncher};

use crate::config::{ConnectSettings, ProbeSettings};
use crate::progress;

/// Options shared by every subcommand
pub struct Globals {
    pub history: PathBuf,
    pub ipinfo_token: Option<String>,
    pub verbose: bool,
}

#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "Config")]
    path: String,
    #[tabled(rename = "Location")]
    location: String,
}

impl From<&Candidate> for CandidateRow {
    fn from(candidate: &Candidate) -> Self {
        Self {
            path: candidate.path.clone(),
            location: candidate.location.to_string(),
        }
    }
}

fn candidate_table(candidates: &[Candidate]) -> String {
    Table::new(candidates.iter().map(CandidateRow::from)).to_string()
}

/// Cancel `token` on the first Ctrl-C
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            token.cancel();
        }
    });
}

/// The client needs root to create tunnel devices; say so up front
pub fn warn_if_unprivileged() {
    #[cfg(unix)]
    let unprivileged = !nix::unistd::geteuid().is_root();
    #[cfg(not(unix))]
    let unprivileged = false;

    if unprivileged {
        eprintln!(
            "{}",
            "Warning: not running as root; openvpn may fail to create the tunnel device".yellow()
        );
    }
}

fn classifier(verbose: bool) -> OutputClassifier {
    OutputClassifier::new(SignalVocabulary::default(), verbose)
}

pub async fn run_probe(
    settings: ProbeSettings,
    globals: &Globals,
    cancel: CancellationToken,
) -> Result<()> {
    let dir = settings.dir.clone();
    let paths = tokio::task::spawn_blocking(move || discover_configs(&dir))
        .await
        .context("Config discovery task failed")?
        .with_context(|| format!("Cannot read configs in {}", settings.dir.display()))?;

    if settings.modify {
        let targets = paths.clone();
        let report = tokio::task::spawn_blocking(move || modify_configs(&targets))
            .await
            .context("Cipher rewrite task failed")?;
        println!(
            "{} {} modified, {} already modified, {} unchanged, {} failed",
            "Cipher rewrite:".bold(),
            report.modified.len(),
            report.already_modified.len(),
            report.unchanged.len(),
            report.failed.len()
        );
        for (path, reason) in &report.failed {
            println!("  {} {} ({})", "✗".red(), path, reason);
        }
    }

    let total = paths.len();
    println!(
        "Testing {} configs with {} workers (Limit: {} success)",
        total,
        settings.probe.effective_workers(total),
        settings.probe.success_limit
    );

    let resolver = IpInfoResolver::new(globals.ipinfo_token.clone())
        .context("Failed to build HTTP client")?;
    let prober = Prober::new(
        Arc::new(SubprocessLauncher::new()),
        Arc::new(resolver),
        classifier(globals.verbose),
        Arc::new(SystemTimeProvider),
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = progress::spawn_reporter(rx, total, globals.verbose);

    let found = prober
        .probe_all(paths, &settings.probe, cancel.clone(), Some(tx))
        .await;
    let scanned = reporter.await.unwrap_or(0);

    println!();
    println!("{}", "--- Final Result ---".cyan().bold());
    if !found.is_empty() {
        println!("{}", candidate_table(&found));
    }
    println!("Found: {} / Scanned: {}", found.len(), scanned);

    if cancel.is_cancelled() && found.is_empty() {
        // Keep the previous history rather than replacing it with nothing
        println!("{}", "Cancelled; history left unchanged".yellow());
        return Ok(());
    }

    let store = FlatFileCandidateStore::new(&globals.history);
    store
        .save(&found)
        .await
        .with_context(|| format!("Cannot save history to {}", globals.history.display()))?;
    println!(
        "{} {} (view with `vmate recent`)",
        "✓ Saved to".green(),
        globals.history.display()
    );

    Ok(())
}

pub async fn run_connect(
    settings: ConnectSettings,
    globals: &Globals,
    cancel: CancellationToken,
) -> Result<()> {
    let resolver = IpInfoResolver::new(globals.ipinfo_token.clone())
        .context("Failed to build HTTP client")?;
    let (tx, rx) = mpsc::unbounded_channel();

    let supervisor = FailoverSupervisor::new(
        Arc::new(SubprocessLauncher::new()),
        Arc::new(resolver),
        Arc::new(FlatFileCandidateStore::new(&globals.history)),
        classifier(globals.verbose),
        settings.supervisor.clone(),
    )
    .with_events(tx);

    let printer = tokio::spawn(print_session_events(rx));
    let start = Candidate::new(settings.config_path.to_string_lossy());

    let result = supervisor.supervise(start, cancel).await;
    drop(supervisor);
    let _ = printer.await;

    match result {
        Ok(()) => Ok(()),
        Err(SupervisorError::CandidatesExhausted(last)) => {
            anyhow::bail!("No working config left in history (last tried: {})", last)
        }
        Err(e) => Err(e).context("Connection supervisor failed"),
    }
}

async fn print_session_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connecting { candidate } => {
                println!("{} {}", "Connecting to".cyan(), candidate.display_name())
            }
            SessionEvent::Connected {
                candidate,
                location,
            } => println!(
                "{} {} [{}]",
                "✓ Connected:".green().bold(),
                candidate.display_name(),
                location
            ),
            SessionEvent::Reconnecting { candidate, reason } => println!(
                "{} {} ({})",
                "Reconnecting".yellow(),
                candidate.display_name(),
                reason
            ),
            SessionEvent::Rotating { from, to, reason } => println!(
                "{} {} -> {} ({})",
                "Switching config".yellow(),
                from.display_name(),
                to.display_name(),
                reason
            ),
            SessionEvent::Exhausted { last } => println!(
                "{} {}",
                "✗ No saved configs left after".red(),
                last.display_name()
            ),
            SessionEvent::Cancelled => println!("{}", "Disconnected".cyan()),
        }
    }
}

pub async fn run_recent(history: &Path) -> Result<()> {
    let store = FlatFileCandidateStore::new(history);
    match store.load().await {
        Ok(candidates) if candidates.is_empty() => {
            println!("{}", "History is empty".yellow());
        }
        Ok(candidates) => {
            println!("{}", "Recently working configs:".cyan().bold());
            println!("{}", candidate_table(&candidates));
        }
        Err(StoreError::NoHistory) => {
            warn!(path = %history.display(), "No history file");
            println!(
                "{}",
                "No saved configs yet; run `vmate probe` first".yellow()
            );
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Cannot read {}", history.display()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmate_core::domain::Location;

    #[test]
    fn test_candidate_table_lists_rows() {
        let table = candidate_table(&[
            Candidate::with_location("/vpn/jp.ovpn", Location::Country("JP".to_string())),
            Candidate::with_location("/vpn/x.ovpn", Location::ApiError),
        ]);
        assert!(table.contains("/vpn/jp.ovpn"));
        assert!(table.contains("JP"));
        assert!(table.contains("ERR_API"));
        assert!(table.contains("Location"));
    }

    #[tokio::test]
    async fn test_recent_without_history_is_ok() {
        let path = std::env::temp_dir().join("vmate-missing-history-dir/recent.txt");
        assert!(run_recent(&path).await.is_ok());
    }
}
