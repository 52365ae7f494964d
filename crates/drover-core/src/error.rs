use std::path::PathBuf;

use thiserror::Error;

/// Result type for registry and supervisor operations.
pub type Result<T> = std::result::Result<T, DroverError>;

/// Errors surfaced by registry and supervisor operations.
#[derive(Debug, Error)]
pub enum DroverError {
    #[error("no such job: {0}")]
    NotFound(String),

    #[error("failed to {op} {}: {source}", .path.display())]
    Storage {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("job name already taken: {0}")]
    NameTaken(String),

    #[error("{0}")]
    ProcessControl(String),

    #[error("failed to launch job: {0}")]
    Launch(String),

    /// The restart poll gave up waiting for the old process to go away.
    #[error("job {id} was still active after {waited_ms} ms")]
    RestartTimeout { id: u64, waited_ms: u64 },
}

impl DroverError {
    pub(crate) fn storage(
        op: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            op,
            path: path.into(),
            source,
        }
    }
}
