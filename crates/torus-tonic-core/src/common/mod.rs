//! Shared protocol definitions used by the worker, broker and client.
//!
//! ## Submodules
//!
//! - [`error`] - Service error type and its `tonic::Status` mapping.
//! - [`types`] - Wire/grid conversions and protocol constants.
//! - [`proto`] - Messages and generated gRPC stubs.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// Messages and generated gRPC stubs for the `torus` package.
///
/// ## Services
///
/// - `Worker` ([`proto::worker_server`], [`proto::worker_client`])
/// - `Broker` ([`proto::broker_server`], [`proto::broker_client`])
///
/// Grids travel as flat row-major byte strings, one byte per cell, `255`
/// alive and `0` dead. Every message carrying a grid also carries its width
/// and height.
pub mod proto {
    mod messages;
    pub use messages::*;

    include!(concat!(env!("OUT_DIR"), "/torus.Worker.rs"));
    include!(concat!(env!("OUT_DIR"), "/torus.Broker.rs"));
}
