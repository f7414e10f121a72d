//! # Lossbench Engine
//!
//! Orchestration of a loss-matrix benchmark run.
//!
//! ## Key Components
//!
//! - **LossController / NetemController**: sets the simulated packet-loss
//!   percentage on the loopback path and resets it when the run ends
//! - **TrialExecutor / ProcessTrialRunner**: runs one receiver/sender process
//!   pair and parses the receiver's captured output
//! - **ResultAggregator**: stores per-cell averages in the time and bandwidth
//!   tables
//! - **MatrixRunner**: walks loss levels x transport configurations, one cell
//!   at a time
//! - **BenchConfig**: run parameters, loadable from JSON
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lossbench_core::adapter::AdapterSet;
//! use lossbench_engine::{BenchConfig, MatrixRunner, NetemController, ProcessTrialRunner};
//!
//! #[tokio::main]
//! async fn main() -> lossbench_core::Result<()> {
//!     let config = BenchConfig::default().with_trial_count(3);
//!     let adapters = AdapterSet::in_dir(&config.bin_dir);
//!     let impairment = NetemController::from_config(&config);
//!     let executor = ProcessTrialRunner::from_config(&config);
//!
//!     let mut runner = MatrixRunner::new(config, adapters, impairment, executor);
//!     let report = runner.run().await?;
//!     println!("{}", report.time_table);
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod impairment;
pub mod matrix;
pub mod runner;

pub use aggregator::*;
pub use config::*;
pub use impairment::*;
pub use matrix::*;
pub use runner::*;
