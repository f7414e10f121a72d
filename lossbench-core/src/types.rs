//! # Core Types
//!
//! Fundamental types shared by every stage of a benchmark run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{BenchError, Result};

/// Identifier attached to one full matrix run, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Percentage of packets synthetically dropped on the test path.
///
/// Only whole percentages between 0 and 100 are representable. The value is
/// process-wide state of the network environment; exactly one level is
/// active at any time.
///
/// # Examples
///
/// ```rust
/// use lossbench_core::LossLevel;
///
/// let loss = LossLevel::new(5).unwrap();
/// assert_eq!(loss.percent(), 5);
/// assert_eq!(loss.to_string(), "5%");
/// assert!(LossLevel::new(101).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct LossLevel(u8);

impl LossLevel {
    /// No synthetic loss.
    pub const ZERO: LossLevel = LossLevel(0);

    /// Creates a loss level, rejecting values above 100.
    pub fn new(percent: u8) -> Result<Self> {
        if percent > 100 {
            return Err(BenchError::InvalidLossLevel {
                value: i64::from(percent),
            });
        }
        Ok(Self(percent))
    }

    /// Returns the percentage as a whole number.
    pub fn percent(&self) -> u8 {
        self.0
    }

    /// Returns the argument understood by `netem`, e.g. `"10%"`.
    pub fn as_netem_arg(&self) -> String {
        format!("{}%", self.0)
    }
}

impl TryFrom<u8> for LossLevel {
    type Error = BenchError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LossLevel> for u8 {
    fn from(loss: LossLevel) -> Self {
        loss.0
    }
}

impl FromStr for LossLevel {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('%');
        let value: i64 = trimmed
            .parse()
            .map_err(|_| BenchError::config(format!("invalid loss level `{s}`")))?;
        if !(0..=100).contains(&value) {
            return Err(BenchError::InvalidLossLevel { value });
        }
        Self::new(value as u8)
    }
}

impl fmt::Display for LossLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// TCP congestion-control algorithm requested through `-algo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionAlgorithm {
    Reno,
    Cubic,
    Bbr,
    Vegas,
}

impl CongestionAlgorithm {
    /// Name as understood by the kernel's `TCP_CONGESTION` socket option.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reno => "reno",
            Self::Cubic => "cubic",
            Self::Bbr => "bbr",
            Self::Vegas => "vegas",
        }
    }
}

impl fmt::Display for CongestionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CongestionAlgorithm {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reno" => Ok(Self::Reno),
            "cubic" => Ok(Self::Cubic),
            "bbr" => Ok(Self::Bbr),
            "vegas" => Ok(Self::Vegas),
            other => Err(BenchError::config(format!(
                "unknown congestion control algorithm `{other}`"
            ))),
        }
    }
}

/// One transport selection benchmarked as a row of the result tables.
///
/// # Examples
///
/// ```rust
/// use lossbench_core::{CongestionAlgorithm, TransportConfig};
///
/// let tcp = TransportConfig::tcp(CongestionAlgorithm::Cubic, CongestionAlgorithm::Reno);
/// assert_eq!(tcp.label(), "TCP R:reno S:cubic");
/// assert_eq!(TransportConfig::Rudp.label(), "RUDP");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum TransportConfig {
    Rudp,
    Tcp {
        sender: CongestionAlgorithm,
        receiver: CongestionAlgorithm,
    },
}

impl TransportConfig {
    pub fn tcp(sender: CongestionAlgorithm, receiver: CongestionAlgorithm) -> Self {
        Self::Tcp { sender, receiver }
    }

    /// Row key used in the result tables.
    pub fn label(&self) -> String {
        match self {
            Self::Rudp => "RUDP".to_string(),
            Self::Tcp { sender, receiver } => format!("TCP R:{receiver} S:{sender}"),
        }
    }

    /// Every receiver/sender pairing drawn from `algorithms`, receiver-major.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lossbench_core::{CongestionAlgorithm::*, TransportConfig};
    ///
    /// let configs = TransportConfig::tcp_matrix(&[Reno, Cubic]);
    /// assert_eq!(configs.len(), 4);
    /// assert_eq!(configs[1].label(), "TCP R:reno S:cubic");
    /// ```
    pub fn tcp_matrix(algorithms: &[CongestionAlgorithm]) -> Vec<Self> {
        algorithms
            .iter()
            .flat_map(|&receiver| {
                algorithms
                    .iter()
                    .map(move |&sender| Self::Tcp { sender, receiver })
            })
            .collect()
    }

    /// RUDP (when requested) followed by the full TCP matrix.
    pub fn full_set(include_rudp: bool, algorithms: &[CongestionAlgorithm]) -> Vec<Self> {
        let mut configs = Vec::with_capacity(1 + algorithms.len() * algorithms.len());
        if include_rudp {
            configs.push(Self::Rudp);
        }
        configs.extend(Self::tcp_matrix(algorithms));
        configs
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A single completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Elapsed transfer time in milliseconds
    pub time_ms: f64,
    /// Throughput in megabytes per second
    pub speed_mbps: f64,
}

impl TrialResult {
    pub fn new(time_ms: f64, speed_mbps: f64) -> Self {
        Self {
            time_ms,
            speed_mbps,
        }
    }
}

/// Parsed receiver output for one batch of trials.
///
/// `trials` holds the individual rows in the order the receiver printed them
/// and `average` holds the row labeled `Average`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBatchOutcome {
    pub trials: Vec<TrialResult>,
    pub average: TrialResult,
}

impl TrialBatchOutcome {
    /// Total number of rows the receiver produced, average row included.
    pub fn row_count(&self) -> usize {
        self.trials.len() + 1
    }

    /// Checks that exactly `trial_count` trials plus the average row arrived.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lossbench_core::{TrialBatchOutcome, TrialResult};
    ///
    /// let outcome = TrialBatchOutcome {
    ///     trials: vec![TrialResult::new(10.0, 5.0), TrialResult::new(20.0, 5.0)],
    ///     average: TrialResult::new(15.0, 5.0),
    /// };
    /// assert!(outcome.ensure_complete(2).is_ok());
    /// assert!(outcome.ensure_complete(3).is_err());
    /// ```
    pub fn ensure_complete(&self, trial_count: usize) -> Result<()> {
        let expected = trial_count + 1;
        let actual = self.row_count();
        if expected != actual {
            return Err(BenchError::IncompleteBatch { expected, actual });
        }
        Ok(())
    }

    /// Arithmetic mean of the individual trial times, if any trials exist.
    pub fn computed_mean_time(&self) -> Option<f64> {
        mean(self.trials.iter().map(|t| t.time_ms))
    }

    /// Arithmetic mean of the individual trial throughputs, if any trials exist.
    pub fn computed_mean_speed(&self) -> Option<f64> {
        mean(self.trials.iter().map(|t| t.speed_mbps))
    }

    /// Whether the reported average time agrees with the trial mean within
    /// `relative_tolerance`.
    pub fn average_is_consistent(&self, relative_tolerance: f64) -> bool {
        match self.computed_mean_time() {
            Some(computed) => {
                let scale = computed.abs().max(self.average.time_ms.abs()).max(f64::EPSILON);
                (computed - self.average.time_ms).abs() / scale <= relative_tolerance
            }
            None => true,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
