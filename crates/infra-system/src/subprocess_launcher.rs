// Subprocess launcher implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info};

use vmate_core::application::constants::LINE_CHANNEL_CAPACITY;
use vmate_core::domain::LaunchSpec;
use vmate_core::port::{LaunchError, LineStream, ProcessLauncher, TunnelProcess};

use crate::process_tree;

/// Subprocess launcher
/// Spawns the client in its own process group with merged, line-split output
#[derive(Default)]
pub struct SubprocessLauncher;

impl SubprocessLauncher {
    pub fn new() -> Self {
        Self
    }

    fn build_command(&self, spec: &LaunchSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own group: Ctrl-C on the terminal does not reach the client, and the
        // whole tree can be signalled at once
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

#[async_trait]
impl ProcessLauncher for SubprocessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn TunnelProcess>, LaunchError> {
        let mut child = self
            .build_command(spec)
            .spawn()
            .map_err(|e| LaunchError::SpawnFailed(format!("{}: {}", spec.program, e)))?;

        let pid = child.id();
        let output = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => Some(merge_output(stdout, stderr)),
            _ => None,
        };

        info!(
            program = %spec.program,
            args = ?spec.args,
            pid = ?pid,
            "Client process started"
        );

        Ok(Box::new(ChildProcess { child, pid, output }))
    }
}

/// Fan stdout and stderr into one line channel; closes when both hit EOF
fn merge_output(stdout: ChildStdout, stderr: ChildStderr) -> LineStream {
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    tokio::spawn(forward_lines(stdout, tx.clone()));
    tokio::spawn(forward_lines(stderr, tx));
    rx
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                // Client output is not guaranteed to be UTF-8
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if tx.send(line).await.is_err() {
                    // Classifier finished; stop reading
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "Client output read failed");
                break;
            }
        }
    }
}

/// A spawned client and its process group
pub struct ChildProcess {
    child: Child,
    /// Cleared once the tree is confirmed gone
    pid: Option<u32>,
    output: Option<LineStream>,
}

#[async_trait]
impl TunnelProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn take_output(&mut self) -> Option<LineStream> {
        self.output.take()
    }

    async fn terminate(&mut self) -> Result<(), LaunchError> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        process_tree::terminate_tree(&mut self.child, pid).await?;
        self.pid = None;
        Ok(())
    }

    fn kill_now(&mut self) {
        if let Some(pid) = self.pid.take() {
            process_tree::kill_tree_now(&mut self.child, pid);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process_tree::is_alive;

    fn sh(script: &str) -> LaunchSpec {
        LaunchSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            mode: vmate_core::domain::LaunchMode::Probe,
        }
    }

    #[tokio::test]
    async fn test_merged_output_lines() {
        let launcher = SubprocessLauncher::new();
        let mut process = launcher
            .launch(&sh("echo out-line; echo err-line 1>&2"))
            .await
            .unwrap();

        let mut lines = process.take_output().unwrap();
        let mut seen = Vec::new();
        while let Some(line) = lines.recv().await {
            seen.push(line);
        }
        seen.sort();
        assert_eq!(seen, vec!["err-line", "out-line"]);

        process.terminate().await.unwrap();
        assert!(process.pid().is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let launcher = SubprocessLauncher::new();
        let spec = LaunchSpec::probe("/nonexistent/openvpn-binary", "a.ovpn");

        let result = launcher.launch(&spec).await;
        assert!(matches!(result, Err(LaunchError::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn test_terminate_kills_grandchild() {
        let launcher = SubprocessLauncher::new();
        let mut process = launcher
            .launch(&sh("sleep 30 & echo grandchild=$!; wait"))
            .await
            .unwrap();
        let pid = process.pid().unwrap();

        let mut lines = process.take_output().unwrap();
        let first = lines.recv().await.unwrap();
        let grandchild: u32 = first.trim_start_matches("grandchild=").parse().unwrap();
        assert!(is_alive(grandchild));

        process.terminate().await.unwrap();

        assert!(!is_alive(pid));
        assert!(!is_alive(grandchild));
    }

    #[tokio::test]
    async fn test_kill_now_is_idempotent() {
        let launcher = SubprocessLauncher::new();
        let mut process = launcher.launch(&sh("sleep 30")).await.unwrap();

        process.kill_now();
        process.kill_now();
        assert!(process.pid().is_none());
        // Already released: terminate is a no-op
        process.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_child_inherits_environment() {
        std::env::set_var("VMATE_LAUNCHER_TEST_VAR", "inherited");
        let launcher = SubprocessLauncher::new();
        let mut process = launcher
            .launch(&sh("echo \"$VMATE_LAUNCHER_TEST_VAR\""))
            .await
            .unwrap();

        let mut lines = process.take_output().unwrap();
        assert_eq!(lines.recv().await.as_deref(), Some("inherited"));

        process.terminate().await.unwrap();
    }
}
