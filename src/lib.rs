pub mod config;
pub mod dispatch;
pub mod error;
pub mod fleet;
pub mod shutdown;
pub mod spool;
pub mod supervisor;
pub mod worker;

pub use error::{Result, SpoolError};
