//! Producer side of the spool: bind named events to handlers and serialize
//! each emission into a queue.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_QUEUE;
use crate::error::Result;
use crate::spool::{Job, QueueRegistry};

/// Wire format for spooled handler invocations.
///
/// One envelope per job file, JSON-encoded. The spool itself never looks
/// inside; only [`DispatchHandler`](crate::worker::DispatchHandler) and the
/// handlers it routes to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Registered name of the handler that should run this job.
    pub handler: String,
    /// Handler-specific arguments.
    pub args: Value,
    /// When the producer emitted the event.
    pub enqueued_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(handler: impl Into<String>, args: Value) -> Self {
        Self {
            handler: handler.into(),
            args,
            enqueued_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode the envelope carried by a claimed job.
    pub fn from_job(job: &Job) -> Result<Self> {
        Self::from_bytes(&job.payload()?)
    }
}

#[derive(Debug, Clone)]
struct Binding {
    handler: String,
    queue: String,
}

/// Binds named events to spooled handlers.
///
/// `connect` registers a (handler name, queue) pair for an event; `emit`
/// writes one envelope per binding into the bound queue. Emitting an event
/// nobody connected to writes nothing.
pub struct Dispatcher {
    registry: QueueRegistry,
    bindings: HashMap<String, Vec<Binding>>,
}

impl Dispatcher {
    pub fn new(registry: QueueRegistry) -> Self {
        Self {
            registry,
            bindings: HashMap::new(),
        }
    }

    /// Bind `event` to `handler`, spooled through `queue` (the default
    /// queue when `None`).
    pub fn connect(
        &mut self,
        event: impl Into<String>,
        handler: impl Into<String>,
        queue: Option<&str>,
    ) {
        let binding = Binding {
            handler: handler.into(),
            queue: queue.unwrap_or(DEFAULT_QUEUE).to_string(),
        };
        self.bindings.entry(event.into()).or_default().push(binding);
    }

    /// Write one job per binding of `event` and return the job names.
    pub fn emit(&self, event: &str, args: &Value) -> Result<Vec<String>> {
        let bindings = match self.bindings.get(event) {
            Some(bindings) => bindings,
            None => return Ok(Vec::new()),
        };

        let mut written = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let queue = self.registry.queue(&binding.queue)?;
            let envelope = Envelope::new(binding.handler.clone(), args.clone());
            let name = queue.submit(&envelope.to_bytes()?)?;
            tracing::debug!(
                event,
                handler = %binding.handler,
                queue = %binding.queue,
                job = %name,
                "dispatched event"
            );
            written.push(name);
        }
        Ok(written)
    }
}
