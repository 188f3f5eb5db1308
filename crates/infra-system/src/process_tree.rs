// Process tree inspection and teardown
// reason: sysinfo for descendant discovery, nix for group signals (unix)
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, System};
use tokio::process::Child;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use vmate_core::application::constants::{
    TERMINATE_GRACE, TREE_EXIT_POLL_INTERVAL, TREE_EXIT_TIMEOUT,
};
use vmate_core::port::LaunchError;

/// All transitive children of `root` in the current process table
pub fn descendants(root: u32) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes();

    let mut found = Vec::new();
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([Pid::from_u32(root)]);

    while let Some(parent) = queue.pop_front() {
        for (pid, process) in sys.processes() {
            if process.parent() == Some(parent) && seen.insert(pid.as_u32()) {
                found.push(pid.as_u32());
                queue.push_back(*pid);
            }
        }
    }
    found
}

/// True while `pid` exists and is not a zombie
pub fn is_alive(pid: u32) -> bool {
    let mut sys = System::new();
    let pid = Pid::from_u32(pid);
    if !sys.refresh_process(pid) {
        return false;
    }
    sys.process(pid)
        .map(|p| p.status() != ProcessStatus::Zombie)
        .unwrap_or(false)
}

/// Terminate `child` and everything it spawned, then confirm it is gone
///
/// SIGTERM to the group first, SIGKILL after `TERMINATE_GRACE`, then poll
/// until every member of the tree disappeared (bounded by `TREE_EXIT_TIMEOUT`).
pub async fn terminate_tree(child: &mut Child, pid: u32) -> Result<(), LaunchError> {
    // Snapshot before signalling: killed parents get their children reparented
    let tree = descendants(pid);
    debug!(pid = %pid, descendants = ?tree, "Terminating process tree");

    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        signal_tree(pid, &tree, Signal::SIGTERM);
        let exited = timeout(TERMINATE_GRACE, child.wait()).await.is_ok();
        if !exited {
            warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
        }
        signal_tree(pid, &tree, Signal::SIGKILL);
    }

    #[cfg(windows)]
    {
        // Windows: taskkill /T walks the tree, /F forces
        let output = tokio::process::Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .output()
            .await
            .map_err(|e| LaunchError::Kill(e.to_string()))?;
        if !output.status.success() {
            debug!(
                pid = %pid,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "taskkill reported failure"
            );
        }
    }

    match timeout(TREE_EXIT_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => debug!(pid = %pid, status = %status, "Client process reaped"),
        Ok(Err(e)) => return Err(LaunchError::IoError(e.to_string())),
        Err(_) => {
            return Err(LaunchError::Kill(format!(
                "process {} still running after SIGKILL",
                pid
            )))
        }
    }

    wait_until_gone(pid, &tree, TREE_EXIT_TIMEOUT).await
}

/// Fire-and-forget SIGKILL of the whole tree (drop paths)
pub fn kill_tree_now(child: &mut Child, pid: u32) {
    #[cfg(unix)]
    {
        let tree = descendants(pid);
        signal_tree(pid, &tree, nix::sys::signal::Signal::SIGKILL);
    }

    #[cfg(windows)]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .output();
    }

    let _ = child.start_kill();
}

#[cfg(unix)]
fn signal_tree(pgid: u32, tree: &[u32], signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg};
    use nix::unistd::Pid as NixPid;

    // 0 would target our own group, 1 is init
    if pgid <= 1 {
        warn!(pgid = %pgid, "Refusing to signal protected process group");
        return;
    }

    match killpg(NixPid::from_raw(pgid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = %pgid, signal = ?signal, error = %e, "Group signal failed"),
    }
    for pid in tree.iter().filter(|p| **p > 1) {
        match kill(NixPid::from_raw(*pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => debug!(pid = %pid, signal = ?signal, error = %e, "Signal failed"),
        }
    }
}

async fn wait_until_gone(pid: u32, tree: &[u32], limit: Duration) -> Result<(), LaunchError> {
    let deadline = Instant::now() + limit;
    loop {
        let alive: Vec<u32> = tree.iter().copied().filter(|p| is_alive(*p)).collect();
        if alive.is_empty() {
            info!(pid = %pid, descendants = tree.len(), "Process tree terminated");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(LaunchError::Kill(format!(
                "descendants of {} still alive: {:?}",
                pid, alive
            )));
        }
        tokio::time::sleep(TREE_EXIT_POLL_INTERVAL).await;
    }
}
