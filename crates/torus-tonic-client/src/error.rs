//! Error type for the client driver.

use std::path::PathBuf;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The broker answered with an error status.
    #[error("Broker call failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// The broker could not be reached.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// A grid from disk or from the broker is malformed.
    #[error("Grid error: {0}")]
    Grid(#[from] torus_tonic_core::torus::Error),

    /// The run parameters do not fit the input image or the wire format.
    #[error("Invalid parameters: {reason}")]
    InvalidParams { reason: String },

    /// A grid could not be put on the wire.
    #[error("Wire error: {0}")]
    Wire(#[from] torus_tonic_core::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
