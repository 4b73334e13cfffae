//! Error types for the torus cluster services.
//!
//! This module defines the central `Error` enum shared by the worker and the
//! broker. It implements `From<Error>` for `tonic::Status` so handlers can
//! surface failures to callers with a fitting gRPC status code.
//!
//! ## Error Cases
//! - `InvalidRequest`: The request was malformed (dimensions, band, counts).
//! - `Grid`: The grid bytes did not form a valid grid.
//! - `WorkerUnavailable`: A worker call failed at the transport or status level.
//! - `WorkerTimeout`: A worker did not answer within the band deadline.
//! - `Busy`: A run is already in progress on the broker.
//! - `ChannelError`: An internal communication failure between tasks.
//! - `ServiceShutdown`: The service is shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the worker and broker services.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The grid carried by a request or response is malformed.
    #[error("Grid error: {0}")]
    Grid(#[from] torus::Error),

    /// A worker could not be reached or answered with an error status.
    #[error("Worker {worker} unavailable: {reason}")]
    WorkerUnavailable { worker: String, reason: String },

    /// A worker did not answer before the per-call deadline.
    #[error("Worker {worker} timed out after {after_ms}ms")]
    WorkerTimeout { worker: String, after_ms: u64 },

    /// A turn computation is already running.
    #[error("A run is already in progress")]
    Busy,

    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::Grid(e) => Status::invalid_argument(format!("Grid error: {e}")),
            Error::WorkerUnavailable { worker, reason } => {
                Status::unavailable(format!("Worker {worker} unavailable: {reason}"))
            }
            Error::WorkerTimeout { worker, after_ms } => {
                Status::deadline_exceeded(format!("Worker {worker} timed out after {after_ms}ms"))
            }
            Error::Busy => Status::failed_precondition("A run is already in progress"),
            Error::ChannelError { context } => Status::internal(format!("Channel error: {context}")),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
