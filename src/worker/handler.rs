use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::Envelope;
use crate::error::{Result, SpoolError};
use crate::spool::Job;

/// Pluggable executor for claimed jobs.
///
/// An `Err` marks the job failed: the worker logs it, leaves the file in the
/// processing directory and moves on to the next cycle.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<()>;
}

/// Maps handler names to implementations.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

/// Routes dispatch envelopes to registered handlers by name.
///
/// This is the handler a stock worker runs with: it decodes the
/// [`Envelope`] a producer wrote, looks the named handler up and passes the
/// job through. An unknown name is a handler failure, so the job file
/// stays put.
pub struct DispatchHandler {
    registry: HandlerRegistry,
}

impl DispatchHandler {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl JobHandler for DispatchHandler {
    async fn handle(&self, job: &Job) -> Result<()> {
        let envelope = Envelope::from_job(job)?;
        let handler = self
            .registry
            .get(&envelope.handler)
            .ok_or_else(|| SpoolError::HandlerNotFound(envelope.handler.clone()))?;
        tracing::debug!(job = %job.name(), handler = %envelope.handler, "routing job");
        handler.handle(job).await
    }
}
