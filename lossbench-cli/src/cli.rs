use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lossbench_core::{CongestionAlgorithm, LossLevel};
use lossbench_engine::{BenchConfig, IncompleteBatchPolicy};

#[derive(Debug, Parser)]
#[command(
    name = "lossbench",
    version,
    about = "Compare a reliable-UDP transport against TCP congestion control \
             under simulated packet loss"
)]
pub struct Cli {
    /// JSON configuration file; command-line flags override its values.
    #[arg(long, env = "LOSSBENCH_CONFIG")]
    pub config: Option<PathBuf>,
    /// Loss percentages to test, e.g. `0,2,5,10`.
    #[arg(long, value_delimiter = ',')]
    pub loss: Option<Vec<LossLevel>>,
    /// TCP congestion-control algorithms, e.g. `reno,cubic`.
    #[arg(long, value_delimiter = ',')]
    pub algos: Option<Vec<CongestionAlgorithm>>,
    /// Trials per cell.
    #[arg(long)]
    pub trials: Option<usize>,
    /// Port shared by every receiver/sender pair.
    #[arg(long)]
    pub port: Option<u16>,
    /// Address the senders connect to.
    #[arg(long)]
    pub host: Option<String>,
    /// Directory holding the RUDP_* and TCP_* executables.
    #[arg(long)]
    pub bin_dir: Option<PathBuf>,
    /// Skip the RUDP row.
    #[arg(long)]
    pub no_rudp: bool,
    /// Run `tc` directly instead of through `sudo`.
    #[arg(long)]
    pub no_sudo: bool,
    /// Network device carrying the loss rule.
    #[arg(long)]
    pub device: Option<String>,
    /// Seconds to wait for a receiver (and a sender) to exit.
    #[arg(long)]
    pub receiver_timeout_secs: Option<u64>,
    /// Abort the run when a receiver reports the wrong number of rows.
    #[arg(long)]
    pub abort_on_incomplete: bool,
    /// Write the full report as JSON to this path.
    #[arg(long)]
    pub json_out: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Loads the configuration file, if any, and overlays the flags.
    pub fn bench_config(&self) -> Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_json_file(path)
                .with_context(|| format!("load configuration {}", path.display()))?,
            None => BenchConfig::default(),
        };

        if let Some(loss) = &self.loss {
            config.loss_levels = loss.clone();
        }
        if let Some(algos) = &self.algos {
            config.algorithms = algos.clone();
        }
        if let Some(trials) = self.trials {
            config.trial_count = trials;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(dir) = &self.bin_dir {
            config.bin_dir = dir.clone();
        }
        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if let Some(secs) = self.receiver_timeout_secs {
            config.receiver_timeout = Duration::from_secs(secs);
            config.sender_timeout = Duration::from_secs(secs);
        }
        if self.no_rudp {
            config.include_rudp = false;
        }
        if self.no_sudo {
            config.use_sudo = false;
        }
        if self.abort_on_incomplete {
            config.incomplete_batch_policy = IncompleteBatchPolicy::Abort;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}
