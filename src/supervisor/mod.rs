//! Process lifecycle for spool workers.
//!
//! # Components
//!
//! - [`daemon`]: double-fork daemonization with stdio redirection
//! - [`pidfile`]: pid file IO and exact process liveness probes
//!
//! The instance name ties the pieces together: it names both the worker's
//! processing directory and its pid file, and `status` cross-references the
//! two to classify each worker.

pub mod daemon;
pub mod pidfile;

pub use daemon::daemonize;

use nix::unistd::{gethostname, getpid};

/// Instance name for this process: `<hostname>-<pid>`.
pub fn instance_name() -> String {
    let host = gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());
    format!("{}-{}", host, getpid())
}
