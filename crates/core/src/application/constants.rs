// Engine constants (no magic values)
use std::time::Duration;

/// Connection-establishment deadline in persistent mode (5s)
pub const DEFAULT_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-probe timeout in batch mode (15s)
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum concurrent probes
pub const DEFAULT_MAX_WORKERS: usize = 200;

/// Stop probing after this many successes
pub const DEFAULT_SUCCESS_LIMIT: usize = 100;

/// Buffered lines between the pipe readers and the classifier
pub const LINE_CHANNEL_CAPACITY: usize = 256;

/// Time given to a process group after SIGTERM before SIGKILL (500ms)
pub const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Upper bound on waiting for a killed tree to disappear (5s)
pub const TREE_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness polling interval while waiting for a tree to exit
pub const TREE_EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
