//! Operator-facing fleet control: start, stop and inspect spool workers.
//!
//! - **start**: daemonize (unless foreground), bind a processing directory,
//!   write the pid file, then drive the worker loop until shutdown
//! - **stop**: SIGINT every tracked pid, then delete its pid file
//! - **status**: cross-reference processing directories against pid files
//!   and probe each recorded pid for liveness
//!
//! `stop` and `status` operate on every queue under the spool root unless
//! one is named; `start` always targets exactly one queue.

pub mod status;

pub use status::{FleetStatus, InstanceHealth, InstanceStatus, OrphanedPidFile};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;

use crate::config::WorkerConfig;
use crate::error::{Result, SpoolError};
use crate::shutdown::{install_shutdown_handler, ShutdownMode};
use crate::spool::job;
use crate::spool::QueueRegistry;
use crate::supervisor::{self, daemon, pidfile};
use crate::worker::{JobHandler, SpoolWorker};

/// Start one worker for `config.queue` and run it to completion.
///
/// Order matters here: the spool root is resolved to an absolute path and
/// the fork happens before anything else, so the instance name, the pid
/// file and the processing directory all belong to the process that
/// actually runs the loop. The async runtime is built last, after the
/// forks.
pub fn start_worker(config: &WorkerConfig, handler: Arc<dyn JobHandler>) -> Result<()> {
    let root = daemon::absolutize(&config.root)?;

    if !config.foreground {
        daemon::daemonize(&config.daemon)?;
    }

    let registry = QueueRegistry::new(root);
    let queue = registry.queue(&config.queue)?;
    let instance = supervisor::instance_name();

    let slot = queue.bind_worker(&instance)?;
    pidfile::write_pidfile(&queue.run_dir(), &instance, std::process::id())?;

    let worker = SpoolWorker::new(slot, handler, config.idle_sleep);
    let mode = if config.graceful_shutdown {
        ShutdownMode::Graceful
    } else {
        ShutdownMode::Forced
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SpoolError::Internal(format!("failed to build runtime: {}", e)))?;

    runtime.block_on(async {
        let shutdown = install_shutdown_handler(mode);
        tracing::info!(
            queue = %config.queue,
            instance = %instance,
            idle_sleep_ms = config.idle_sleep.as_millis() as u64,
            graceful = config.graceful_shutdown,
            "starting spool worker"
        );
        worker.run(shutdown).await
    })
}

/// Outcome of signalling one tracked pid.
#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub queue: String,
    pub instance: String,
    /// `None` when the pid file did not parse.
    pub pid: Option<u32>,
    /// Whether SIGINT was delivered.
    pub signalled: bool,
}

/// Send SIGINT to every tracked worker and delete its pid file.
///
/// Converges on repetition: pids that are already gone and files that do
/// not parse are reported, and the pid file is removed regardless, so a
/// second run finds nothing.
pub fn stop(registry: &QueueRegistry, queue: Option<&str>) -> Result<Vec<StopOutcome>> {
    let mut outcomes = Vec::new();

    for name in target_queues(registry, queue)? {
        let q = registry.peek(&name);
        for path in pidfile::list_pidfiles(&q.run_dir())? {
            let instance = pidfile::instance_of(&path).unwrap_or_default().to_string();
            let outcome = match pidfile::read_pidfile(&path) {
                Ok(pid) => {
                    let signalled = signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT).is_ok();
                    tracing::info!(queue = %name, instance = %instance, pid, signalled, "stopping worker");
                    StopOutcome {
                        queue: name.clone(),
                        instance,
                        pid: Some(pid),
                        signalled,
                    }
                }
                Err(e) => {
                    tracing::warn!(queue = %name, path = %path.display(), error = %e, "removing unreadable pid file");
                    StopOutcome {
                        queue: name.clone(),
                        instance,
                        pid: None,
                        signalled: false,
                    }
                }
            };
            pidfile::remove_pidfile(&path)?;
            outcomes.push(outcome);
        }
    }

    Ok(outcomes)
}

/// Inspect every worker instance's on-disk state for the target queues.
pub fn status(registry: &QueueRegistry, queue: Option<&str>) -> Result<FleetStatus> {
    let mut report = FleetStatus::default();

    for name in target_queues(registry, queue)? {
        let q = registry.peek(&name);

        // Instance -> recorded pid; entries are consumed as processing
        // directories match up, leftovers are orphans.
        let mut pids: BTreeMap<String, Option<u32>> = BTreeMap::new();
        for path in pidfile::list_pidfiles(&q.run_dir())? {
            if let Some(instance) = pidfile::instance_of(&path) {
                pids.insert(instance.to_string(), pidfile::read_pidfile(&path).ok());
            }
        }

        for instance in list_dirs(&q.processing_root())? {
            let dir = q.processing_root().join(&instance);
            let (jobs, max_age_secs) = scan_jobs(&dir)?;
            let health = match pids.remove(&instance) {
                Some(Some(pid)) if pidfile::pid_alive(pid) => InstanceHealth::Running,
                Some(_) => InstanceHealth::CrashedNoProcess,
                None => InstanceHealth::CrashedNoPidfile,
            };
            report.instances.push(InstanceStatus {
                queue: name.clone(),
                instance,
                jobs,
                max_age_secs,
                health,
            });
        }

        for (instance, pid) in pids {
            report.orphaned.push(OrphanedPidFile {
                queue: name.clone(),
                instance,
                pid,
            });
        }
    }

    Ok(report)
}

fn target_queues(registry: &QueueRegistry, queue: Option<&str>) -> Result<Vec<String>> {
    match queue {
        Some(name) => Ok(vec![name.to_string()]),
        None => registry.queue_names(),
    }
}

fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SpoolError::io(dir, e)),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}

fn scan_jobs(dir: &Path) -> Result<(usize, u64)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((0, 0)),
        Err(e) => return Err(SpoolError::io(dir, e)),
    };

    let mut jobs = 0;
    let mut max_age = Duration::ZERO;
    for entry in entries.filter_map(|entry| entry.ok()) {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        jobs += 1;
        if let Ok(age) = job::file_age(&entry.path()) {
            max_age = max_age.max(age);
        }
    }
    Ok((jobs, max_age.as_secs()))
}
