use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, SpoolError};
use crate::spool::job::{self, Job};

/// Subdirectory holding jobs waiting to be claimed.
pub const INCOMING_DIR: &str = "in";
/// Subdirectory holding one processing directory per worker instance.
pub const PROCESSING_DIR: &str = "processing";
/// Subdirectory holding pid files.
pub const RUN_DIR: &str = "run";

/// One named spool under a spool root.
///
/// Layout: `<root>/<name>/in`, `<root>/<name>/processing/<instance>` and
/// `<root>/<name>/run/<instance>.pid`. All three live on the same
/// filesystem, which is what makes the rename-based claim atomic.
#[derive(Debug, Clone)]
pub struct SpoolQueue {
    name: String,
    dir: PathBuf,
}

impl SpoolQueue {
    /// View of the queue's paths. Touches nothing on disk, so inspection
    /// commands never leave directories behind.
    pub fn at(root: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            dir: root.join(name),
        }
    }

    /// Open the queue, creating its directory skeleton if missing.
    pub fn open(root: &Path, name: &str) -> Result<Self> {
        let queue = Self::at(root, name);
        for sub in [INCOMING_DIR, PROCESSING_DIR, RUN_DIR] {
            let path = queue.dir.join(sub);
            fs::create_dir_all(&path).map_err(|e| SpoolError::io(&path, e))?;
        }
        Ok(queue)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn incoming_dir(&self) -> PathBuf {
        self.dir.join(INCOMING_DIR)
    }

    pub fn processing_root(&self) -> PathBuf {
        self.dir.join(PROCESSING_DIR)
    }

    pub fn run_dir(&self) -> PathBuf {
        self.dir.join(RUN_DIR)
    }

    /// Write a job into the incoming directory and return its name.
    ///
    /// The payload goes to a dot-prefixed temp name first and is renamed
    /// into place, so claimants never see a half-written job.
    pub fn submit(&self, payload: &[u8]) -> Result<String> {
        let name = job::next_job_name();
        let incoming = self.incoming_dir();
        let tmp = incoming.join(format!(".{}.tmp", name));
        fs::write(&tmp, payload).map_err(|e| SpoolError::io(&tmp, e))?;
        let dst = incoming.join(&name);
        fs::rename(&tmp, &dst).map_err(|e| SpoolError::io(&dst, e))?;
        tracing::debug!(queue = %self.name, job = %name, "submitted job");
        Ok(name)
    }

    /// Create the processing directory for `instance` and return its claim
    /// surface. This is the only place a processing directory comes from.
    pub fn bind_worker(&self, instance: &str) -> Result<WorkerSlot> {
        let processing = self.processing_root().join(instance);
        fs::create_dir_all(&processing).map_err(|e| SpoolError::io(&processing, e))?;
        Ok(WorkerSlot {
            queue: self.name.clone(),
            incoming: self.incoming_dir(),
            processing,
        })
    }
}

/// One worker's exclusive claim surface: its processing directory plus the
/// operations that move jobs in and out of it.
#[derive(Debug)]
pub struct WorkerSlot {
    queue: String,
    incoming: PathBuf,
    processing: PathBuf,
}

impl WorkerSlot {
    pub fn processing_dir(&self) -> &Path {
        &self.processing
    }

    /// Claim the oldest waiting job by renaming it into this worker's
    /// processing directory.
    ///
    /// Candidates are tried in name order. A rename that comes back
    /// NotFound means another worker claimed that job first; the next
    /// candidate is tried. Returns `None` when nothing is claimable.
    /// Dot-prefixed temp files are ignored; entries with non-unicode names
    /// are skipped with a warning.
    pub fn claim(&self) -> Result<Option<Job>> {
        let entries = match fs::read_dir(&self.incoming) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SpoolError::io(&self.incoming, e)),
        };

        let mut names: Vec<String> = Vec::new();
        for entry in entries.filter_map(|entry| entry.ok()) {
            match entry.file_name().into_string() {
                Ok(name) => {
                    if !name.starts_with('.') {
                        names.push(name);
                    }
                }
                Err(other) => {
                    tracing::warn!(
                        queue = %self.queue,
                        entry = %other.to_string_lossy(),
                        "skipping job with non-unicode name"
                    );
                }
            }
        }
        names.sort();

        for name in names {
            let src = self.incoming.join(&name);
            let dst = self.processing.join(&name);
            match fs::rename(&src, &dst) {
                Ok(()) => {
                    tracing::debug!(queue = %self.queue, job = %name, "claimed job");
                    return Ok(Some(Job::new(name, dst)));
                }
                // Lost the race to another worker.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(SpoolError::io(&src, e)),
            }
        }
        Ok(None)
    }

    /// Remove a finished job's file.
    pub fn complete(&self, job: &Job) -> Result<()> {
        fs::remove_file(job.path()).map_err(|e| SpoolError::io(job.path(), e))?;
        tracing::debug!(queue = %self.queue, job = %job.name(), "completed job");
        Ok(())
    }

    /// Remove the processing directory on clean exit. Only an empty
    /// directory is removed; files left behind by failed jobs keep it in
    /// place for `status` to report.
    pub fn release(&self) {
        if let Err(e) = fs::remove_dir(&self.processing) {
            tracing::warn!(
                path = %self.processing.display(),
                error = %e,
                "leaving processing directory behind"
            );
        }
    }
}
