use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpoolError {
    #[error("No handler registered: {0}")]
    HandlerNotFound(String),

    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("Malformed pid file: {}", .0.display())]
    MalformedPidFile(PathBuf),

    #[error("Daemonization failed: {0}")]
    Daemonize(String),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpoolError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpoolError>;
