use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use torus_tonic_server::server::{
    broker::run_broker_with_incoming,
    config::{BrokerCliArgs, BrokerConfig},
    signal::cancel_on_signal,
    telemetry::init_telemetry,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = BrokerCliArgs::parse();
    let config = BrokerConfig::try_from(args)?;

    let providers = init_telemetry("torus-broker")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let tcp = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    let incoming = TcpListenerStream::new(tcp);

    log_startup_info(&config);

    let res = run_broker_with_incoming(incoming, config, shutdown).await;
    providers.shutdown();
    res
}

fn log_startup_info(config: &BrokerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting broker on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting broker on {} with {} workers",
            config.server_addr,
            config.worker_addrs.len()
        );
    }
}
