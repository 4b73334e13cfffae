use crate::params::Params;
use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;
use torus_tonic_core::types::DEFAULT_BROKER_PORT;

/// Runtime configuration for the `torus-client` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "torus-client",
    version,
    about = "Runs Game of Life turns on a torus broker and reports progress"
)]
pub struct CliArgs {
    /// Broker address, `host:port` or a full URI.
    ///
    /// Environment variable: `BROKER_ADDR`
    #[arg(long, env = "BROKER_ADDR", default_value_t = format!("127.0.0.1:{DEFAULT_BROKER_PORT}"))]
    pub broker_addr: String,

    /// Number of generations to run.
    ///
    /// Environment variable: `TURNS`
    #[arg(long, env = "TURNS", default_value_t = 10_000_000_000)]
    pub turns: u64,

    /// Number of workers to spread each generation over.
    ///
    /// Environment variable: `THREADS`
    #[arg(long, env = "THREADS", default_value_t = 8)]
    pub threads: usize,

    /// Grid width; selects the input image.
    ///
    /// Environment variable: `WIDTH`
    #[arg(long, env = "WIDTH", default_value_t = 512)]
    pub width: usize,

    /// Grid height; selects the input image.
    ///
    /// Environment variable: `HEIGHT`
    #[arg(long, env = "HEIGHT", default_value_t = 512)]
    pub height: usize,

    /// Directory holding `<width>x<height>.pgm` input images.
    ///
    /// Environment variable: `IMAGES_DIR`
    #[arg(long, env = "IMAGES_DIR", default_value = "images")]
    pub images_dir: PathBuf,

    /// Directory snapshots are written to.
    ///
    /// Environment variable: `OUT_DIR`
    #[arg(long, env = "OUT_DIR", default_value = "out")]
    pub out_dir: PathBuf,

    /// Interval between alive-cell reports, in milliseconds.
    ///
    /// Environment variable: `ALIVE_INTERVAL_MS`
    #[arg(long, env = "ALIVE_INTERVAL_MS", default_value_t = 2_000)]
    pub alive_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub broker_addr: String,
    pub params: Params,
    pub images_dir: PathBuf,
    pub out_dir: PathBuf,
    pub alive_interval: Duration,
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.threads == 0 {
            bail!("THREADS must be greater than 0");
        }

        if args.width == 0 || args.height == 0 {
            bail!("WIDTH and HEIGHT must be greater than 0");
        }

        if args.alive_interval_ms == 0 {
            bail!("ALIVE_INTERVAL_MS must be greater than 0");
        }

        let broker_addr = if args.broker_addr.contains("://") {
            args.broker_addr
        } else {
            format!("http://{}", args.broker_addr)
        };

        Ok(Self {
            broker_addr,
            params: Params {
                width: args.width,
                height: args.height,
                turns: args.turns,
                threads: args.threads,
            },
            images_dir: args.images_dir,
            out_dir: args.out_dir,
            alive_interval: Duration::from_millis(args.alive_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::try_from(CliArgs::parse_from(["torus-client"])).unwrap();
        assert_eq!(config.broker_addr, "http://127.0.0.1:8030");
        assert_eq!(config.params.threads, 8);
        assert_eq!(config.alive_interval, Duration::from_secs(2));
    }

    #[test]
    fn keeps_explicit_scheme() {
        let args = CliArgs::parse_from([
            "torus-client",
            "--broker-addr",
            "http://10.0.0.5:9000",
            "--width",
            "64",
            "--height",
            "32",
        ]);
        let config = ClientConfig::try_from(args).unwrap();
        assert_eq!(config.broker_addr, "http://10.0.0.5:9000");
        assert_eq!(config.params.input_name(), "64x32");
    }

    #[test]
    fn rejects_zero_threads() {
        let args = CliArgs::parse_from(["torus-client", "--threads", "0"]);
        assert!(ClientConfig::try_from(args).is_err());
    }
}
