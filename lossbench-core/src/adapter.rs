//! # Protocol Adapters
//!
//! An adapter knows the command-line surface and output schema of one
//! transport's sender/receiver pair. The trial runner stays transport
//! agnostic and only asks the adapter for process specifications and for a
//! parse of the captured receiver output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::output::{parse_trial_table, OutputSchema};
use crate::{BenchError, Result, TransportConfig, TrialBatchOutcome};

/// Executable plus arguments for one process launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Command-line and output contract of one transport implementation.
///
/// # Examples
///
/// ```rust
/// use lossbench_core::adapter::{ProtocolAdapter, RudpAdapter};
/// use lossbench_core::TransportConfig;
///
/// let adapter = RudpAdapter::new("./RUDP_Receiver", "./RUDP_Sender");
/// let receiver = adapter.build_receiver_command(&TransportConfig::Rudp, 5000).unwrap();
/// assert_eq!(receiver.args, vec!["-p", "5000", "-format"]);
/// ```
pub trait ProtocolAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether this adapter can drive the given configuration.
    fn supports(&self, config: &TransportConfig) -> bool;

    /// Receiver launch: listening port and machine-readable output.
    fn build_receiver_command(&self, config: &TransportConfig, port: u16) -> Result<ProcessSpec>;

    /// Sender launch: `trial_count` automatic transfers against `host:port`.
    fn build_sender_command(
        &self,
        config: &TransportConfig,
        port: u16,
        host: &str,
        trial_count: usize,
    ) -> Result<ProcessSpec>;

    /// Decodes captured receiver stdout.
    fn parse_output(&self, raw: &[u8]) -> Result<TrialBatchOutcome> {
        parse_trial_table(raw, &OutputSchema::default())
    }
}

fn unsupported(adapter: &str, config: &TransportConfig) -> BenchError {
    BenchError::config(format!("{adapter} adapter cannot run {}", config.label()))
}

/// Adapter for the reliable-UDP sender/receiver pair.
#[derive(Debug, Clone)]
pub struct RudpAdapter {
    receiver: PathBuf,
    sender: PathBuf,
}

impl RudpAdapter {
    pub fn new(receiver: impl Into<PathBuf>, sender: impl Into<PathBuf>) -> Self {
        Self {
            receiver: receiver.into(),
            sender: sender.into(),
        }
    }

    /// Binaries named `RUDP_Receiver` and `RUDP_Sender` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("RUDP_Receiver"), dir.join("RUDP_Sender"))
    }
}

impl ProtocolAdapter for RudpAdapter {
    fn name(&self) -> &str {
        "rudp"
    }

    fn supports(&self, config: &TransportConfig) -> bool {
        matches!(config, TransportConfig::Rudp)
    }

    fn build_receiver_command(&self, config: &TransportConfig, port: u16) -> Result<ProcessSpec> {
        if !self.supports(config) {
            return Err(unsupported(self.name(), config));
        }
        Ok(ProcessSpec::new(&self.receiver)
            .arg("-p")
            .arg(port.to_string())
            .arg("-format"))
    }

    fn build_sender_command(
        &self,
        config: &TransportConfig,
        port: u16,
        host: &str,
        trial_count: usize,
    ) -> Result<ProcessSpec> {
        if !self.supports(config) {
            return Err(unsupported(self.name(), config));
        }
        Ok(ProcessSpec::new(&self.sender).args([
            "-p".to_string(),
            port.to_string(),
            "-ip".to_string(),
            host.to_string(),
            "-auto".to_string(),
            trial_count.to_string(),
        ]))
    }
}

/// Adapter for the TCP sender/receiver pair; each side selects its own
/// congestion-control algorithm.
#[derive(Debug, Clone)]
pub struct TcpAdapter {
    receiver: PathBuf,
    sender: PathBuf,
}

impl TcpAdapter {
    pub fn new(receiver: impl Into<PathBuf>, sender: impl Into<PathBuf>) -> Self {
        Self {
            receiver: receiver.into(),
            sender: sender.into(),
        }
    }

    /// Binaries named `TCP_Receiver` and `TCP_Sender` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("TCP_Receiver"), dir.join("TCP_Sender"))
    }
}

impl ProtocolAdapter for TcpAdapter {
    fn name(&self) -> &str {
        "tcp"
    }

    fn supports(&self, config: &TransportConfig) -> bool {
        matches!(config, TransportConfig::Tcp { .. })
    }

    fn build_receiver_command(&self, config: &TransportConfig, port: u16) -> Result<ProcessSpec> {
        let TransportConfig::Tcp { receiver, .. } = config else {
            return Err(unsupported(self.name(), config));
        };
        Ok(ProcessSpec::new(&self.receiver).args([
            "-p".to_string(),
            port.to_string(),
            "-algo".to_string(),
            receiver.to_string(),
            "-format".to_string(),
        ]))
    }

    fn build_sender_command(
        &self,
        config: &TransportConfig,
        port: u16,
        host: &str,
        trial_count: usize,
    ) -> Result<ProcessSpec> {
        let TransportConfig::Tcp { sender, .. } = config else {
            return Err(unsupported(self.name(), config));
        };
        Ok(ProcessSpec::new(&self.sender).args([
            "-p".to_string(),
            port.to_string(),
            "-ip".to_string(),
            host.to_string(),
            "-algo".to_string(),
            sender.to_string(),
            "-auto".to_string(),
            trial_count.to_string(),
        ]))
    }
}

/// The adapter pair used by a matrix run, selected per configuration.
#[derive(Clone)]
pub struct AdapterSet {
    pub rudp: Arc<dyn ProtocolAdapter>,
    pub tcp: Arc<dyn ProtocolAdapter>,
}

impl AdapterSet {
    pub fn new(rudp: Arc<dyn ProtocolAdapter>, tcp: Arc<dyn ProtocolAdapter>) -> Self {
        Self { rudp, tcp }
    }

    /// The stock adapters for binaries found in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(
            Arc::new(RudpAdapter::in_dir(dir)),
            Arc::new(TcpAdapter::in_dir(dir)),
        )
    }

    /// Adapter responsible for `config`.
    pub fn for_config(&self, config: &TransportConfig) -> &dyn ProtocolAdapter {
        match config {
            TransportConfig::Rudp => self.rudp.as_ref(),
            TransportConfig::Tcp { .. } => self.tcp.as_ref(),
        }
    }
}

impl fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterSet")
            .field("rudp", &self.rudp.name())
            .field("tcp", &self.tcp.name())
            .finish()
    }
}
