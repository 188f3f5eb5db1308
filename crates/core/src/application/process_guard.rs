// Scoped ownership of a running client process

use crate::port::{LaunchError, LineStream, TunnelProcess};
use tracing::{debug, warn};

/// Owns a launched process until its tree is terminated
///
/// `release` is the normal exit path and waits for the tree to be gone.
/// If the guard is dropped without `release` (panic, aborted future), the
/// tree is killed synchronously in `Drop`.
pub struct ProcessGuard {
    process: Option<Box<dyn TunnelProcess>>,
    label: String,
}

impl ProcessGuard {
    pub fn new(process: Box<dyn TunnelProcess>, label: impl Into<String>) -> Self {
        Self {
            process: Some(process),
            label: label.into(),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    pub fn take_output(&mut self) -> Option<LineStream> {
        self.process.as_mut().and_then(|p| p.take_output())
    }

    /// Terminate the process tree and wait for confirmation
    pub async fn release(mut self) -> Result<(), LaunchError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        debug!(path = %self.label, pid = ?process.pid(), "Terminating client process tree");
        let result = process.terminate().await;
        if let Err(e) = &result {
            warn!(path = %self.label, error = %e, "Tree termination not confirmed, forcing kill");
            process.kill_now();
        }
        result
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(process) = self.process.as_mut() {
            warn!(
                path = %self.label,
                pid = ?process.pid(),
                "Process guard dropped without release, killing tree"
            );
            process.kill_now();
        }
    }
}
