use clap::Parser;
use tokio::sync::mpsc;
use torus_tonic_client::{
    Driver, Event, Outcome, PgmStore,
    config::{CliArgs, ClientConfig},
    keys::stdin_keys,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .pretty(),
        )
        .try_init()?;

    let store = PgmStore::new(&config.images_dir, &config.out_dir);
    let (events_tx, mut events_rx) = mpsc::channel(1024);

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                Event::CellFlipped { .. } => {}
                Event::TurnComplete { turn } => tracing::trace!(turn, "Turn complete"),
                other => tracing::info!("{other}"),
            }
        }
    });

    let mut driver =
        Driver::connect(config.broker_addr.clone(), store, events_tx, config.alive_interval)
            .await?;
    let outcome = driver.run(config.params, stdin_keys()).await?;
    drop(driver);
    printer.await?;

    match outcome {
        Outcome::Completed { turn } => tracing::info!(turn, "Completed"),
        Outcome::Quit { turn } => tracing::info!(turn, "Quit, cluster left running"),
        Outcome::Killed { turn } => tracing::info!(turn, "Cluster killed"),
    }

    Ok(())
}
