//! Error types for the playback engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed cause carried by [`PlaybackError::Engine`]
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The source file does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The source could not be decoded, or reports an unusable format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Backend failure (read, render, device)
    #[error("Engine error: {0}")]
    Engine(#[source] BoxedCause),

    /// A render graph node could not be configured
    #[error("Node error: {0}")]
    Node(String),

    /// A seek target could not be reached
    #[error("Seek failed")]
    Seek,

    /// Operation is not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Wrap any error (or message) as an engine failure
    pub fn engine(cause: impl Into<BoxedCause>) -> Self {
        Self::Engine(cause.into())
    }

    pub fn node(msg: impl Into<String>) -> Self {
        Self::Node(msg.into())
    }

    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Category of this error, without its payload
    ///
    /// IO failures are backend failures and report [`ErrorKind::Engine`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::InvalidFormat(_) => ErrorKind::InvalidFormat,
            Self::Engine(_) | Self::Io(_) => ErrorKind::Engine,
            Self::Node(_) => ErrorKind::Node,
            Self::Seek => ErrorKind::Seek,
            Self::InvalidState(_) => ErrorKind::InvalidState,
        }
    }
}

/// Payload-free error category, cheap to copy into events and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FileNotFound,
    InvalidFormat,
    Engine,
    Node,
    Seek,
    InvalidState,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
