use std::path::PathBuf;
use std::time::Duration;

/// Queue a worker binds when none is named.
pub const DEFAULT_QUEUE: &str = "default";

/// Spool root used when none is given on the command line.
pub const DEFAULT_SPOOL_ROOT: &str = "/var/spool/spoolq";

/// How long a worker sleeps after finding its queue empty.
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_secs(1);

/// Configuration for detaching a worker from its terminal.
///
/// After the double fork, stdin points at /dev/null and stdout/stderr at the
/// log files below. Relative log paths are resolved against the working
/// directory the process started in, not `working_dir`.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Directory the daemon runs in.
    pub working_dir: PathBuf,
    /// File receiving the daemon's stdout.
    pub stdout_log: PathBuf,
    /// File receiving the daemon's stderr.
    pub stderr_log: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("/"),
            stdout_log: PathBuf::from("/dev/null"),
            stderr_log: PathBuf::from("/dev/null"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Spool root containing one directory per queue.
    pub root: PathBuf,
    /// Queue this worker binds.
    pub queue: String,
    /// Sleep between cycles when the queue is empty.
    pub idle_sleep: Duration,
    /// On SIGINT/SIGTERM, finish the current cycle and exit cleanly instead
    /// of exiting hard with status 1.
    pub graceful_shutdown: bool,
    /// Stay attached to the terminal instead of daemonizing.
    pub foreground: bool,
    pub daemon: DaemonConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_SPOOL_ROOT),
            queue: DEFAULT_QUEUE.to_string(),
            idle_sleep: DEFAULT_IDLE_SLEEP,
            graceful_shutdown: false,
            foreground: false,
            daemon: DaemonConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn new(root: impl Into<PathBuf>, queue: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            queue: queue.into(),
            ..Default::default()
        }
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn with_graceful_shutdown(mut self, graceful: bool) -> Self {
        self.graceful_shutdown = graceful;
        self
    }

    pub fn with_foreground(mut self, foreground: bool) -> Self {
        self.foreground = foreground;
        self
    }
}
