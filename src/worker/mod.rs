//! Worker loop driving one spool queue.
//!
//! One worker process owns one queue binding:
//! - **Claiming**: [`SpoolWorker`] pulls the oldest waiting job via rename
//! - **Execution**: a [`JobHandler`] runs it; failures leave the file behind
//! - **Shutdown**: the cancellation token is checked between cycles only
//!
//! # Cycle
//!
//! 1. If the shutdown token fired, release the processing directory and exit
//! 2. Claim the oldest job from the incoming directory
//! 3. Run the handler in its own task so a panic cannot kill the loop
//! 4. Remove the file on success, leave it in place on failure
//! 5. Sleep the idle interval when nothing was claimable

pub mod command;
pub mod handler;

pub use command::CommandHandler;
pub use handler::{DispatchHandler, HandlerRegistry, JobHandler};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::spool::queue::WorkerSlot;
use crate::spool::Job;

/// Drives claim, execute, complete cycles over one queue binding.
pub struct SpoolWorker {
    slot: WorkerSlot,
    handler: Arc<dyn JobHandler>,
    idle_sleep: Duration,
}

impl SpoolWorker {
    pub fn new(slot: WorkerSlot, handler: Arc<dyn JobHandler>, idle_sleep: Duration) -> Self {
        Self {
            slot,
            handler,
            idle_sleep,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// The token is consulted only at the top of each cycle: an in-flight
    /// handler always finishes, so worst-case shutdown latency is one
    /// handler run plus one idle sleep. A clean exit releases the
    /// processing directory; an error return leaves it for `status`.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(
            processing = %self.slot.processing_dir().display(),
            "worker started"
        );

        while !shutdown.is_cancelled() {
            match self.slot.claim()? {
                Some(job) => self.execute(job).await,
                None => tokio::time::sleep(self.idle_sleep).await,
            }
        }

        self.slot.release();
        tracing::info!("worker stopped");
        Ok(())
    }

    async fn execute(&self, job: Job) {
        let waited_ms = job
            .age()
            .map(|age| age.as_millis() as u64)
            .unwrap_or_default();
        tracing::info!(job = %job.name(), waited_ms, "executing job");

        let handler = Arc::clone(&self.handler);
        let task_job = job.clone();
        let outcome = tokio::spawn(async move { handler.handle(&task_job).await }).await;

        match outcome {
            Ok(Ok(())) => {
                if let Err(e) = self.slot.complete(&job) {
                    tracing::error!(job = %job.name(), error = %e, "failed to remove finished job");
                }
            }
            Ok(Err(e)) => {
                tracing::error!(job = %job.name(), error = %e, "job failed, leaving file in place");
            }
            Err(e) => {
                tracing::error!(job = %job.name(), error = %e, "job panicked, leaving file in place");
            }
        }
    }
}
