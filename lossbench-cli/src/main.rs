//! # Lossbench
//!
//! Runs the loss x transport matrix against the RUDP and TCP executables
//! and prints the average transfer time and throughput tables.

mod cli;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use lossbench_core::adapter::AdapterSet;
use lossbench_engine::{MatrixRunner, NetemController, ProcessTrialRunner};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.bench_config()?;
    info!(
        "Benchmarking {} configurations at loss levels {:?} with {} trials each",
        config.transport_configs().len(),
        config
            .loss_levels
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        config.trial_count
    );

    let adapters = AdapterSet::in_dir(&config.bin_dir);
    let impairment = NetemController::from_config(&config);
    let executor = ProcessTrialRunner::from_config(&config);
    let mut runner = MatrixRunner::new(config, adapters, impairment, executor);

    let report = runner.run().await.context("benchmark run failed")?;

    println!("{}", report::render_summary(&report));
    if let Some(path) = &cli.json_out {
        report::write_json(&report, path)?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
