//! The `Broker` gRPC server.
//!
//! ## Submodules
//!
//! - [`state`] - Canonical grid, turn and alive count behind one lock.
//! - [`pool`] - Ordered, lazily connected worker clients with a band deadline.
//! - [`turns`] - The partition, dispatch, merge and commit loop.
//! - [`handler`] - The `Broker` service on top of the three.

pub mod handler;
pub mod pool;
pub mod state;
pub mod turns;

use crate::server::config::BrokerConfig;
use futures::Stream;
use handler::BrokerService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use torus_tonic_core::proto::broker_server::BrokerServer;

fn build_broker_service(service: BrokerService) -> BrokerServer<BrokerService> {
    BrokerServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .max_decoding_message_size(usize::MAX)
        .max_encoding_message_size(usize::MAX)
}

/// Serves a broker on `incoming` until `shutdown` is cancelled, either by a
/// process signal or by a `Shutdown` call.
///
/// # Errors
///
/// Returns an error if a worker address is malformed or the transport fails.
pub async fn run_broker_with_incoming<I, IO, IE>(
    incoming: I,
    config: BrokerConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<BrokerServer<BrokerService>>()
        .await;

    let service = BrokerService::new(&config, shutdown.clone())?;

    Server::builder()
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(build_broker_service(service))
        .serve_with_incoming_shutdown(incoming, async move {
            shutdown.cancelled().await;
            health_reporter
                .set_not_serving::<BrokerServer<BrokerService>>()
                .await;
        })
        .await?;

    tracing::info!("Broker shut down successfully");
    Ok(())
}
