use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::dispatch::Envelope;
use crate::error::{Result, SpoolError};
use crate::spool::Job;
use crate::worker::handler::JobHandler;

/// Envelope args accepted by [`CommandHandler`]:
/// `{"program": "tar", "args": ["-czf", "backup.tgz", "data"]}`.
#[derive(Debug, Deserialize)]
struct CommandArgs {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

/// Stock handler that runs a program with arguments.
///
/// A non-zero exit status is a failure, which leaves the job file in the
/// processing directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandHandler;

#[async_trait]
impl JobHandler for CommandHandler {
    async fn handle(&self, job: &Job) -> Result<()> {
        let envelope = Envelope::from_job(job)?;
        let cmd: CommandArgs = serde_json::from_value(envelope.args)?;

        tracing::info!(job = %job.name(), program = %cmd.program, "running command");

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .await
            .map_err(|e| SpoolError::HandlerFailed(format!("{}: {}", cmd.program, e)))?;

        if output.status.success() {
            tracing::info!(job = %job.name(), program = %cmd.program, "command completed");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SpoolError::HandlerFailed(format!(
                "{} exited with {:?}: {}",
                cmd.program,
                output.status.code(),
                stderr.trim()
            )))
        }
    }
}
