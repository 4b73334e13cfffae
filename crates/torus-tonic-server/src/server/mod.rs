//! Server-side components of the torus cluster.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration for both binaries.
//! - [`worker`] - The `Worker` gRPC service: one generation over a row band.
//! - [`broker`] - The `Broker` gRPC service: cluster state, the turn loop and
//!   the control plane.
//! - [`signal`] - Process signal handling feeding the shutdown token.
//! - [`telemetry`] - Logging setup and optional OpenTelemetry export.
//!
//! These pieces are wired together in `src/bin/worker.rs` and
//! `src/bin/broker.rs`, and by the integration tests, which run whole
//! clusters in-process on ephemeral ports.

pub mod broker;
pub mod config;
pub mod signal;
pub mod telemetry;
pub mod worker;
