//! Shared fixtures: a fake `openvpn` that runs the config body as a shell script

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use vmate_infra_system::process_tree::is_alive;

/// Scratch directory holding the fake client and its configs
pub struct Lab {
    pub dir: TempDir,
    pub client: String,
}

impl Lab {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let client = dir.path().join("fake-openvpn");
        // argv: --config <path> [probe flags...]
        fs::write(&client, "#!/bin/sh\nexec /bin/sh \"$2\"\n").unwrap();
        fs::set_permissions(&client, fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            dir,
            client: client.to_string_lossy().into_owned(),
        }
    }

    /// Write a config whose body is the shell script `body`
    ///
    /// `$PIDFILE` inside the body expands to a per-config file for recording
    /// background pids.
    pub fn config(&self, name: &str, body: &str) -> String {
        let path = self.dir.path().join(name);
        let pidfile = self.pidfile(name);
        let script = format!("PIDFILE='{}'\n{}\n", pidfile.display(), body);
        fs::write(&path, script).unwrap();
        path.to_string_lossy().into_owned()
    }

    pub fn pidfile(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.pids", name))
    }

    /// Every pid recorded by the named config, across all of its launches
    pub fn recorded_pids(&self, name: &str) -> Vec<u32> {
        fs::read_to_string(self.pidfile(name))
            .unwrap_or_default()
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Tunnel comes up and stays up; a background helper stands in for a grandchild
pub const CONNECTS: &str = "sleep 30 &
echo $! >> \"$PIDFILE\"
echo 'Initialization Sequence Completed'
wait";

/// Handshake fails outright
pub const AUTH_FAILS: &str = "echo 'AUTH: Received control message: AUTH_FAILED'\nsleep 30";

/// Never says anything
pub const SILENT: &str = "sleep 30 &\necho $! >> \"$PIDFILE\"\nwait";

/// Exits before connecting
pub const EXITS: &str = "echo 'Options error'\nexit 1";

/// Comes up, then the link drops
pub const DROPS: &str = "echo 'Initialization Sequence Completed'
sleep 0.3
echo 'read: Connection reset by peer'
sleep 30";

/// First launch comes up and drops; every later launch fails the handshake
pub const DROPS_THEN_AUTH_FAILS: &str = "launches=$(cat \"$PIDFILE.launches\" 2>/dev/null || echo 0)
launches=$((launches + 1))
echo $launches > \"$PIDFILE.launches\"
if [ \"$launches\" -eq 1 ]; then
  echo 'Initialization Sequence Completed'
  sleep 0.3
  echo 'read: Connection reset by peer'
else
  echo 'AUTH: Received control message: AUTH_FAILED'
fi
sleep 30";

/// Assert none of `pids` is still running
pub fn assert_all_gone(pids: &[u32]) {
    for pid in pids {
        assert!(!is_alive(*pid), "process {} outlived its probe", pid);
    }
}

pub const SHORT: Duration = Duration::from_millis(1500);
