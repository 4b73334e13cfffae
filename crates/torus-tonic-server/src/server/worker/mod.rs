//! The `Worker` gRPC server.
//!
//! [`run_worker_with_incoming`] serves [`handler::WorkerService`] together
//! with the standard health service until the shutdown token is cancelled,
//! either by a process signal or by a `kill` band request.

pub mod handler;

use futures::Stream;
use handler::WorkerService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use torus_tonic_core::proto::worker_server::WorkerServer;

fn build_worker_service(service: WorkerService) -> WorkerServer<WorkerService> {
    WorkerServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .max_decoding_message_size(usize::MAX)
        .max_encoding_message_size(usize::MAX)
}

/// Serves a worker on `incoming` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the transport fails.
pub async fn run_worker_with_incoming<I, IO, IE>(
    incoming: I,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<WorkerServer<WorkerService>>()
        .await;

    let service = WorkerService::new(shutdown.clone());

    Server::builder()
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(build_worker_service(service))
        .serve_with_incoming_shutdown(incoming, async move {
            shutdown.cancelled().await;
            health_reporter
                .set_not_serving::<WorkerServer<WorkerService>>()
                .await;
        })
        .await?;

    tracing::info!("Worker shut down successfully");
    Ok(())
}
