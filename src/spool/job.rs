use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Result, SpoolError};

/// A claimed unit of work: one file that has been renamed into a worker's
/// processing directory.
///
/// The payload is opaque to the spool. Producers that go through the
/// dispatcher write [`Envelope`](crate::dispatch::Envelope) JSON, but nothing
/// here depends on that.
#[derive(Debug, Clone)]
pub struct Job {
    name: String,
    path: PathBuf,
}

impl Job {
    pub(crate) fn new(name: String, path: PathBuf) -> Self {
        Self { name, path }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn payload(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| SpoolError::io(&self.path, e))
    }

    /// Time since the job was written by its producer. The modification
    /// timestamp survives the claim rename, so this measures real queue time.
    pub fn age(&self) -> Result<Duration> {
        file_age(&self.path)
    }
}

/// Generate a unique job file name.
///
/// The zero-padded millisecond prefix keeps a sorted directory listing in
/// creation order; the uuid suffix keeps concurrent producers from
/// colliding.
pub fn next_job_name() -> String {
    format!(
        "{:013}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

pub(crate) fn file_age(path: &Path) -> Result<Duration> {
    let metadata = fs::metadata(path).map_err(|e| SpoolError::io(path, e))?;
    let modified = metadata.modified().map_err(|e| SpoolError::io(path, e))?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default())
}
