// Process Launcher Port
// Abstraction for spawning the external tunnel client and tearing it down

use crate::domain::LaunchSpec;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Merged stdout/stderr of a child, one trimmed-or-raw line per message.
/// The channel closes once every output pipe reached EOF.
pub type LineStream = mpsc::Receiver<String>;

/// Launch/teardown errors
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Output stream unavailable")]
    StreamUnavailable,

    #[error("Kill failed: {0}")]
    Kill(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// A running child process (plus whatever it spawned)
#[async_trait]
pub trait TunnelProcess: Send {
    /// OS process id, if the child is still known
    fn pid(&self) -> Option<u32>;

    /// Take the merged output stream. Returns `None` after the first call
    /// or when the pipes could not be attached.
    fn take_output(&mut self) -> Option<LineStream>;

    /// Force-terminate the whole process tree and wait until it is gone
    ///
    /// # Errors
    /// - LaunchError::Kill if the tree could not be confirmed stopped
    async fn terminate(&mut self) -> Result<(), LaunchError>;

    /// Best-effort synchronous kill of the tree, no waiting.
    /// Used from drop paths where `.await` is impossible.
    fn kill_now(&mut self);
}

/// Process Launcher trait
///
/// Implementations:
/// - SubprocessLauncher (infra-system): real OS processes
/// - ScriptedLauncher (mocks): scripted fake output for tests
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn a child according to `spec`
    ///
    /// # Errors
    /// - LaunchError::SpawnFailed if the executable is missing or unlaunchable
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn TunnelProcess>, LaunchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::task::JoinHandle;

    /// One step of scripted output
    #[derive(Debug, Clone)]
    pub enum ScriptStep {
        Line(String),
        Wait(Duration),
    }

    /// Scripted behaviour of one fake process
    #[derive(Debug, Clone, Default)]
    pub struct Script {
        steps: Vec<ScriptStep>,
        /// Keep the stream open after the last step (until terminated)
        hang: bool,
    }

    impl Script {
        pub fn new() -> Self {
            Self::default()
        }

        /// Emits nothing and never exits on its own
        pub fn silent() -> Self {
            Self::new().hang()
        }

        /// Connects immediately and stays up
        pub fn connects() -> Self {
            Self::new().line("Initialization Sequence Completed").hang()
        }

        /// Fails immediately with a keyword and exits
        pub fn fails(keyword: &str) -> Self {
            Self::new().line(&format!("ERROR: {}", keyword))
        }

        pub fn line(mut self, line: &str) -> Self {
            self.steps.push(ScriptStep::Line(line.to_string()));
            self
        }

        pub fn wait_ms(mut self, ms: u64) -> Self {
            self.steps.push(ScriptStep::Wait(Duration::from_millis(ms)));
            self
        }

        pub fn hang(mut self) -> Self {
            self.hang = true;
            self
        }
    }

    /// Counters shared between the launcher and its fake processes
    #[derive(Debug, Default)]
    struct Counters {
        live: AtomicUsize,
        peak: AtomicUsize,
        terminated: AtomicUsize,
    }

    /// Fake launcher: per-path scripts, live process accounting
    pub struct ScriptedLauncher {
        scripts: Mutex<HashMap<String, VecDeque<Script>>>,
        default_script: Script,
        spawn_failures: HashSet<String>,
        launches: Mutex<Vec<LaunchSpec>>,
        counters: Arc<Counters>,
        next_pid: AtomicU32,
    }

    impl ScriptedLauncher {
        pub fn new(default_script: Script) -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                default_script,
                spawn_failures: HashSet::new(),
                launches: Mutex::new(Vec::new()),
                counters: Arc::new(Counters::default()),
                next_pid: AtomicU32::new(10_000),
            }
        }

        /// Queue scripts for a path; the last one repeats for later launches
        pub fn with_scripts(self, path: &str, scripts: Vec<Script>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(path.to_string(), scripts.into_iter().collect());
            self
        }

        pub fn with_script(self, path: &str, script: Script) -> Self {
            self.with_scripts(path, vec![script])
        }

        pub fn with_spawn_failure(mut self, path: &str) -> Self {
            self.spawn_failures.insert(path.to_string());
            self
        }

        /// Processes launched but not yet terminated
        pub fn live_count(&self) -> usize {
            self.counters.live.load(Ordering::SeqCst)
        }

        /// Highest number of simultaneously live processes
        pub fn peak_live(&self) -> usize {
            self.counters.peak.load(Ordering::SeqCst)
        }

        pub fn terminated_count(&self) -> usize {
            self.counters.terminated.load(Ordering::SeqCst)
        }

        pub fn launches(&self) -> Vec<LaunchSpec> {
            self.launches.lock().unwrap().clone()
        }

        /// Config paths in launch order
        pub fn launched_paths(&self) -> Vec<String> {
            self.launches()
                .iter()
                .map(|s| s.config_path().to_string())
                .collect()
        }

        fn next_script(&self, path: &str) -> Script {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(path) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
                Some(queue) => queue.front().cloned().unwrap_or_default(),
                None => self.default_script.clone(),
            }
        }
    }

    #[async_trait]
    impl ProcessLauncher for ScriptedLauncher {
        async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn TunnelProcess>, LaunchError> {
            self.launches.lock().unwrap().push(spec.clone());
            let path = spec.config_path().to_string();

            if self.spawn_failures.contains(&path) {
                return Err(LaunchError::SpawnFailed(format!(
                    "No such file or directory: {}",
                    spec.program
                )));
            }

            let script = self.next_script(&path);
            let (tx, rx) = mpsc::channel(64);
            let task = tokio::spawn(async move {
                for step in script.steps {
                    match step {
                        ScriptStep::Line(line) => {
                            if tx.send(line).await.is_err() {
                                return;
                            }
                        }
                        ScriptStep::Wait(d) => tokio::time::sleep(d).await,
                    }
                }
                if script.hang {
                    std::future::pending::<()>().await;
                }
            });

            let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.peak.fetch_max(live, Ordering::SeqCst);

            Ok(Box::new(FakeProcess {
                pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
                output: Some(rx),
                task,
                counters: Arc::clone(&self.counters),
                terminated: false,
            }))
        }
    }

    /// Fake child driven by a script task
    pub struct FakeProcess {
        pid: u32,
        output: Option<LineStream>,
        task: JoinHandle<()>,
        counters: Arc<Counters>,
        terminated: bool,
    }

    impl FakeProcess {
        fn stop(&mut self) {
            self.task.abort();
            if !self.terminated {
                self.terminated = true;
                self.counters.live.fetch_sub(1, Ordering::SeqCst);
                self.counters.terminated.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl TunnelProcess for FakeProcess {
        fn pid(&self) -> Option<u32> {
            (!self.terminated).then_some(self.pid)
        }

        fn take_output(&mut self) -> Option<LineStream> {
            self.output.take()
        }

        async fn terminate(&mut self) -> Result<(), LaunchError> {
            self.stop();
            Ok(())
        }

        fn kill_now(&mut self) {
            self.stop();
        }
    }
}
