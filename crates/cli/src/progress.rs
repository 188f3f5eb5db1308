// Progress reporting for batch probe runs

use colored::Colorize;
use std::io::Write;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vmate_core::domain::{FailureReason, ProbeEvent, ProbeOutcome};

const BAR_WIDTH: usize = 40;

/// `[####----] 12.5% (5/40)`
pub fn render_bar(done: usize, total: usize) -> String {
    let total = total.max(1);
    let done = done.min(total);
    let filled = done * BAR_WIDTH / total;
    let percent = done as f64 / total as f64 * 100.0;
    format!(
        "[{}{}] {:.1}% ({}/{})",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent,
        done,
        total
    )
}

/// Drain probe events until the sender side is dropped
///
/// Quiet mode redraws a single bar line; verbose mode prints one line per
/// path. Every path advances the bar. Returns the number of probes that
/// reached a verdict, leaving out those cancelled by the limit or Ctrl-C.
pub fn spawn_reporter(
    mut events: mpsc::UnboundedReceiver<ProbeEvent>,
    total: usize,
    verbose: bool,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut done = 0;
        let mut scanned = 0;
        while let Some(event) = events.recv().await {
            done += 1;
            let ProbeEvent::Completed { path, outcome } = event;
            if outcome != ProbeOutcome::Failure(FailureReason::Cancelled) {
                scanned += 1;
            }
            if verbose {
                match outcome {
                    ProbeOutcome::Success => println!("{} {}", "✓".green(), path),
                    ProbeOutcome::Failure(FailureReason::Cancelled) => {
                        println!("{} {}", "-".dimmed(), path)
                    }
                    ProbeOutcome::Failure(reason) => {
                        println!("{} {} ({})", "✗".red(), path, reason)
                    }
                }
            } else {
                print!("\r{}", render_bar(done, total));
                let _ = std::io::stdout().flush();
            }
        }
        if !verbose && done > 0 {
            println!();
        }
        scanned
    })
}
