use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use torus_tonic_server::server::{
    config::{WorkerCliArgs, WorkerConfig},
    signal::cancel_on_signal,
    telemetry::init_telemetry,
    worker::run_worker_with_incoming,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = WorkerCliArgs::parse();
    let config = WorkerConfig::try_from(args)?;

    let providers = init_telemetry("torus-worker")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let tcp = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    let incoming = TcpListenerStream::new(tcp);

    tracing::info!("Starting worker on {}", config.server_addr);

    let res = run_worker_with_incoming(incoming, shutdown).await;
    providers.shutdown();
    res
}
