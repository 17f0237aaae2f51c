use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, SpoolError};
use crate::spool::queue::SpoolQueue;

/// Resolves queue names to queues under a single spool root.
///
/// Built once at process start and passed down explicitly; a worker process
/// binds exactly one queue out of it for its whole lifetime.
#[derive(Debug, Clone)]
pub struct QueueRegistry {
    root: PathBuf,
}

impl QueueRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open the named queue, creating its directories if needed.
    pub fn queue(&self, name: &str) -> Result<SpoolQueue> {
        SpoolQueue::open(&self.root, name)
    }

    /// Read-only view of the named queue. Creates nothing.
    pub fn peek(&self, name: &str) -> SpoolQueue {
        SpoolQueue::at(&self.root, name)
    }

    /// Names of every queue directory under the root, sorted. A missing
    /// root is an empty fleet, not an error.
    pub fn queue_names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SpoolError::io(&self.root, e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }
}
