//! # Lossbench Core - Transport Benchmark Model
//!
//! Core components of a harness that benchmarks a reliable-UDP transport and
//! TCP congestion-control algorithms under simulated packet loss.
//!
//! This crate is free of process and OS interaction. It provides:
//!
//! - **Data Model**: [`LossLevel`], [`TransportConfig`], [`TrialResult`],
//!   [`TrialBatchOutcome`]
//! - **Protocol Adapters**: the command-line contract of each transport's
//!   sender/receiver pair ([`adapter::RudpAdapter`], [`adapter::TcpAdapter`])
//! - **Output Parsing**: decoding of the receivers' row-labeled metric tables
//! - **Result Tables**: [`ResultTable`] indexed by configuration label and loss
//! - **Error Handling**: the [`BenchError`] taxonomy separating fatal run
//!   errors from per-cell failures
//!
//! ```rust
//! use lossbench_core::adapter::{ProtocolAdapter, TcpAdapter};
//! use lossbench_core::{CongestionAlgorithm, TransportConfig};
//!
//! let adapter = TcpAdapter::new("./TCP_Receiver", "./TCP_Sender");
//! let algorithms = [CongestionAlgorithm::Reno, CongestionAlgorithm::Cubic];
//! for config in TransportConfig::tcp_matrix(&algorithms) {
//!     let sender = adapter.build_sender_command(&config, 5000, "127.0.0.1", 5).unwrap();
//!     println!("{} -> {}", config.label(), sender);
//! }
//! ```

pub mod adapter;
pub mod error;
pub mod output;
pub mod table;
pub mod types;

pub use error::*;
pub use table::ResultTable;
pub use types::*;
