//! Error types surfaced through the harness-facing [`crate::Driver`] API.
//!
//! Runtime internals work with `anyhow::Result`; the driver maps those
//! failures onto [`DriverError`] at its boundary so callers can tell an
//! instantiation failure from a missing path without string matching.

use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum DriverError {
    /// The runtime could not create (or replace) an instance.
    #[error("failed to create instance from image '{image}': {source}")]
    Instantiation {
        image: String,
        #[source]
        source: anyhow::Error,
    },

    /// Transport-level failure while starting an instance or running a command.
    #[error("failed to execute {command:?}: {source}")]
    Execution {
        command: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    /// The tarball snapshot could not be produced or read.
    #[error("failed to snapshot '{path}': {source}")]
    Snapshot {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("file {0} not found in image")]
    NotFound(String),

    #[error("{0} is a directory")]
    IsADirectory(String),

    /// Symlink resolution went deeper than [`crate::snapshot::MAX_SYMLINK_DEPTH`].
    #[error("too many levels of symbolic links resolving {0}")]
    SymlinkLoop(String),
}

impl DriverError {
    pub(crate) fn snapshot(path: &str, source: impl Into<anyhow::Error>) -> Self {
        DriverError::Snapshot {
            path: path.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn execution(command: &[String], source: impl Into<anyhow::Error>) -> Self {
        DriverError::Execution {
            command: command.to_vec(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound(_))
    }
}
