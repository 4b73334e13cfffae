use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use torus_tonic_core::types::{DEFAULT_BROKER_PORT, DEFAULT_WORKER_COUNT, DEFAULT_WORKER_PORT};

/// Runtime configuration for the `torus-worker` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "torus-worker",
    version,
    about = "A gRPC worker that advances row bands of a Game of Life grid"
)]
pub struct WorkerCliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = format!("0.0.0.0:{DEFAULT_WORKER_PORT}"))]
    pub server_addr: String,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub server_addr: String,
}

impl TryFrom<WorkerCliArgs> for WorkerConfig {
    type Error = anyhow::Error;

    fn try_from(args: WorkerCliArgs) -> Result<Self, Self::Error> {
        if args.server_addr.trim().is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }
        Ok(Self {
            server_addr: args.server_addr,
        })
    }
}

fn default_worker_addrs() -> Vec<String> {
    (0..DEFAULT_WORKER_COUNT)
        .map(|i| format!("127.0.0.1:{}", DEFAULT_WORKER_PORT + i))
        .collect()
}

/// Runtime configuration for the `torus-broker` binary.
///
/// All values are parsed from CLI arguments or environment variables.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "torus-broker",
    version,
    about = "A gRPC broker that spreads Game of Life generations over workers"
)]
pub struct BrokerCliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = format!("0.0.0.0:{DEFAULT_BROKER_PORT}"))]
    pub server_addr: String,

    /// Comma separated `host:port` list of workers.
    ///
    /// Band `i` of every generation is sent to worker `i`, so the order is
    /// stable across generations. The number of workers used for a run is the
    /// smaller of this list's length, the requested thread count and the grid
    /// height.
    ///
    /// Environment variable: `WORKER_ADDRS`
    #[arg(
        long,
        env = "WORKER_ADDRS",
        value_delimiter = ',',
        default_values_t = default_worker_addrs()
    )]
    pub worker_addrs: Vec<String>,

    /// Deadline for a single `ComputeBand` call, in milliseconds.
    ///
    /// A worker that misses it fails the current generation.
    ///
    /// Environment variable: `BAND_TIMEOUT_MS`
    #[arg(long, env = "BAND_TIMEOUT_MS", default_value_t = 10_000)]
    pub band_timeout_ms: u64,

    /// Largest grid (width * height) accepted by `ComputeTurns`.
    ///
    /// Environment variable: `MAX_GRID_CELLS`
    #[arg(long, env = "MAX_GRID_CELLS", default_value_t = 1 << 24)]
    pub max_grid_cells: usize,

    /// Capacity of the turn-event broadcast buffer. Subscribers that fall
    /// further behind skip the missed events.
    ///
    /// Environment variable: `EVENT_BUFFER_SIZE`
    #[arg(long, env = "EVENT_BUFFER_SIZE", default_value_t = 64)]
    pub event_buffer_size: usize,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub server_addr: String,
    pub worker_addrs: Vec<String>,
    pub band_timeout: Duration,
    pub max_grid_cells: usize,
    pub event_buffer_size: usize,
}

impl TryFrom<BrokerCliArgs> for BrokerConfig {
    type Error = anyhow::Error;

    fn try_from(args: BrokerCliArgs) -> Result<Self, Self::Error> {
        let worker_addrs: Vec<String> = args
            .worker_addrs
            .into_iter()
            .map(|addr| addr.trim().to_owned())
            .filter(|addr| !addr.is_empty())
            .collect();

        if worker_addrs.is_empty() {
            bail!("WORKER_ADDRS must name at least one worker");
        }

        if args.band_timeout_ms == 0 {
            bail!("BAND_TIMEOUT_MS must be greater than 0");
        }

        if args.max_grid_cells == 0 {
            bail!("MAX_GRID_CELLS must be greater than 0");
        }

        if args.event_buffer_size == 0 {
            bail!("EVENT_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            worker_addrs,
            band_timeout: Duration::from_millis(args.band_timeout_ms),
            max_grid_cells: args.max_grid_cells,
            event_buffer_size: args.event_buffer_size,
        })
    }
}

impl BrokerConfig {
    /// Configuration for a broker in front of the given workers, with the
    /// default limits.
    pub fn with_workers(server_addr: impl Into<String>, worker_addrs: Vec<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            worker_addrs,
            band_timeout: Duration::from_secs(10),
            max_grid_cells: 1 << 24,
            event_buffer_size: 64,
        }
    }
}
