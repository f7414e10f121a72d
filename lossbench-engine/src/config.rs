use lossbench_core::{BenchError, CongestionAlgorithm, LossLevel, Result, TransportConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do when a receiver reports a different number of rows than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncompleteBatchPolicy {
    /// Record the discrepancy, leave the cell empty and continue the matrix
    #[default]
    Skip,
    /// Abort the run
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub loss_levels: Vec<LossLevel>,
    pub algorithms: Vec<CongestionAlgorithm>,
    pub include_rudp: bool,
    pub trial_count: usize,
    pub port: u16,
    pub host: String,
    pub bin_dir: PathBuf,
    pub device: String,
    pub use_sudo: bool,
    /// Program used for loss control; `tc` unless overridden
    pub tc_program: PathBuf,
    #[serde(with = "duration_secs")]
    pub receiver_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub sender_timeout: Duration,
    pub incomplete_batch_policy: IncompleteBatchPolicy,
    /// Consecutive launch failures tolerated before the run is aborted
    pub max_consecutive_launch_failures: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            loss_levels: [0, 2, 5, 10]
                .into_iter()
                .filter_map(|p| LossLevel::new(p).ok())
                .collect(),
            algorithms: vec![CongestionAlgorithm::Reno, CongestionAlgorithm::Cubic],
            include_rudp: true,
            trial_count: 5,
            port: 5000,
            host: "127.0.0.1".to_string(),
            bin_dir: PathBuf::from("."),
            device: "lo".to_string(),
            use_sudo: true,
            tc_program: PathBuf::from("tc"),
            receiver_timeout: Duration::from_secs(120),
            sender_timeout: Duration::from_secs(120),
            incomplete_batch_policy: IncompleteBatchPolicy::Skip,
            max_consecutive_launch_failures: 3,
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn with_loss_levels(mut self, loss_levels: Vec<LossLevel>) -> Self {
        self.loss_levels = loss_levels;
        self
    }

    pub fn with_algorithms(mut self, algorithms: Vec<CongestionAlgorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_rudp(mut self, include: bool) -> Self {
        self.include_rudp = include;
        self
    }

    pub fn with_trial_count(mut self, trial_count: usize) -> Self {
        self.trial_count = trial_count;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = dir.into();
        self
    }

    pub fn with_receiver_timeout(mut self, timeout: Duration) -> Self {
        self.receiver_timeout = timeout;
        self
    }

    pub fn with_sender_timeout(mut self, timeout: Duration) -> Self {
        self.sender_timeout = timeout;
        self
    }

    pub fn with_incomplete_batch_policy(mut self, policy: IncompleteBatchPolicy) -> Self {
        self.incomplete_batch_policy = policy;
        self
    }

    pub fn with_max_consecutive_launch_failures(mut self, max: usize) -> Self {
        self.max_consecutive_launch_failures = max;
        self
    }

    /// Transport configurations in matrix order.
    pub fn transport_configs(&self) -> Vec<TransportConfig> {
        TransportConfig::full_set(self.include_rudp, &self.algorithms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trial_count == 0 {
            return Err(BenchError::config("trial_count must be at least 1"));
        }
        if self.port == 0 {
            return Err(BenchError::config("port must be non-zero"));
        }
        if self.host.trim().is_empty() {
            return Err(BenchError::config("host must not be empty"));
        }
        if self.loss_levels.is_empty() {
            return Err(BenchError::config("at least one loss level is required"));
        }
        if self.transport_configs().is_empty() {
            return Err(BenchError::config(
                "no transport configurations: enable RUDP or list at least one algorithm",
            ));
        }
        if self.receiver_timeout.is_zero() || self.sender_timeout.is_zero() {
            return Err(BenchError::config("process timeouts must be non-zero"));
        }
        if self.max_consecutive_launch_failures == 0 {
            return Err(BenchError::config(
                "max_consecutive_launch_failures must be at least 1",
            ));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
