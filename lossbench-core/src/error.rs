//! # Error Types
//!
//! Error taxonomy for a benchmark run.
//!
//! Errors fall into two groups. Run-level errors (impairment control,
//! configuration, escalation of repeated launch failures) abort the matrix
//! after the loss rule has been reset. Cell-level errors (parse failures,
//! incomplete batches, launch failures, timeouts) cause the affected cell to
//! be skipped and recorded while the matrix continues.

use std::time::Duration;
use thiserror::Error;

/// Error types that can occur while orchestrating a benchmark run.
///
/// # Examples
///
/// ```rust
/// use lossbench_core::BenchError;
///
/// let error = BenchError::parse("missing Average row");
/// assert!(!error.is_fatal());
/// assert_eq!(error.kind(), "parse");
/// ```
#[derive(Error, Debug)]
pub enum BenchError {
    /// The loss-control command could not be run or reported failure
    #[error("Impairment error: {message}")]
    Impairment { message: String },

    /// Receiver output is not a well-formed row-labeled numeric table
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The receiver produced a different number of rows than requested
    #[error("Incomplete batch: expected {expected} rows, got {actual}")]
    IncompleteBatch { expected: usize, actual: usize },

    /// A sender or receiver executable could not be started
    #[error("Failed to launch {role} `{program}`: {source}")]
    ProcessLaunch {
        role: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The receiver did not exit within the configured bound
    #[error("Receiver did not exit within {timeout:?}")]
    ReceiverTimeout { timeout: Duration },

    /// The sender did not exit within the configured bound
    #[error("Sender did not exit within {timeout:?}")]
    SenderTimeout { timeout: Duration },

    /// Too many consecutive cells failed to launch their processes
    #[error("{count} consecutive cells failed to launch; last error: {last}")]
    TooManyFailures { count: usize, last: String },

    /// Requested loss level is outside 0..=100
    #[error("Invalid loss level {value}: must be between 0 and 100")]
    InvalidLossLevel { value: i64 },

    /// Invalid harness configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File system or pipe I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results in the benchmark harness.
pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// Creates a new impairment error with the given message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lossbench_core::BenchError;
    ///
    /// let error = BenchError::impairment("tc exited with status 2");
    /// assert!(error.is_fatal());
    /// ```
    pub fn impairment(message: impl Into<String>) -> Self {
        Self::Impairment {
            message: message.into(),
        }
    }

    /// Creates a new parse error with the given message.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a new configuration error with the given message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a launch error for the named process role.
    pub fn launch(role: &'static str, program: impl Into<String>, source: std::io::Error) -> Self {
        Self::ProcessLaunch {
            role,
            program: program.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Fatal errors leave the test environment in an unknown state or signal
    /// a systemic misconfiguration. Everything else is scoped to a single
    /// matrix cell. Whether an [`BenchError::IncompleteBatch`] aborts the run
    /// is a policy decision made by the matrix runner, so it is not fatal here.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lossbench_core::BenchError;
    ///
    /// let error = BenchError::IncompleteBatch { expected: 6, actual: 5 };
    /// assert!(!error.is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Impairment { .. }
                | Self::TooManyFailures { .. }
                | Self::InvalidLossLevel { .. }
                | Self::Config { .. }
        )
    }

    /// Whether this error means a process could not be started at all.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::ProcessLaunch { .. })
    }

    /// Signed row discrepancy for an incomplete batch (expected minus actual).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lossbench_core::BenchError;
    ///
    /// let error = BenchError::IncompleteBatch { expected: 6, actual: 5 };
    /// assert_eq!(error.discrepancy(), Some(1));
    /// ```
    pub fn discrepancy(&self) -> Option<i64> {
        match self {
            Self::IncompleteBatch { expected, actual } => Some(*expected as i64 - *actual as i64),
            _ => None,
        }
    }

    /// Stable short name used in failure records and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Impairment { .. } => "impairment",
            Self::Parse { .. } => "parse",
            Self::IncompleteBatch { .. } => "incomplete_batch",
            Self::ProcessLaunch { .. } => "process_launch",
            Self::ReceiverTimeout { .. } => "receiver_timeout",
            Self::SenderTimeout { .. } => "sender_timeout",
            Self::TooManyFailures { .. } => "too_many_failures",
            Self::InvalidLossLevel { .. } => "invalid_loss_level",
            Self::Config { .. } => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}
