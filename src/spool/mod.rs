pub mod job;
pub mod queue;
pub mod registry;

pub use job::Job;
pub use queue::{SpoolQueue, WorkerSlot};
pub use registry::QueueRegistry;
