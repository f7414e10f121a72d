//! Execution of one trial batch: a receiver/sender process pair.

use async_trait::async_trait;
use lossbench_core::{
    adapter::{ProcessSpec, ProtocolAdapter},
    BenchError, Result, TransportConfig, TrialBatchOutcome,
};
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::BenchConfig;

/// Relative difference tolerated between the reported average and the mean
/// of the trial rows. Receivers print six decimals.
pub const AVERAGE_TOLERANCE: f64 = 1e-3;

/// Grace period for the capture task once the receiver has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Runs one batch of trials for a transport configuration.
#[async_trait]
pub trait TrialExecutor: Send + Sync {
    async fn run(
        &self,
        adapter: &dyn ProtocolAdapter,
        config: &TransportConfig,
        trial_count: usize,
        port: u16,
        host: &str,
    ) -> Result<TrialBatchOutcome>;
}

/// Launches the adapter's real executables.
///
/// The receiver is spawned first with stdout captured and stderr discarded.
/// The sender is then run to completion. The receiver's stdout is drained
/// by a separate task while both processes run, so a chatty receiver can
/// never block on a full pipe.
#[derive(Debug, Clone)]
pub struct ProcessTrialRunner {
    receiver_timeout: Duration,
    sender_timeout: Duration,
}

impl ProcessTrialRunner {
    pub fn new(receiver_timeout: Duration, sender_timeout: Duration) -> Self {
        Self {
            receiver_timeout,
            sender_timeout,
        }
    }

    pub fn from_config(config: &BenchConfig) -> Self {
        Self::new(config.receiver_timeout, config.sender_timeout)
    }

    fn spawn_receiver(spec: &ProcessSpec) -> Result<Child> {
        Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BenchError::launch("receiver", spec.program.display().to_string(), e))
    }

    async fn run_sender(&self, spec: &ProcessSpec) -> Result<()> {
        let mut sender = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BenchError::launch("sender", spec.program.display().to_string(), e))?;

        match timeout(self.sender_timeout, sender.wait()).await {
            Ok(Ok(status)) => {
                if !status.success() {
                    warn!("Sender `{}` exited with {}", spec.program.display(), status);
                }
                Ok(())
            }
            Ok(Err(e)) => Err(BenchError::Io(e)),
            Err(_) => {
                if let Err(e) = sender.kill().await {
                    warn!("Failed to kill hung sender: {}", e);
                }
                Err(BenchError::SenderTimeout {
                    timeout: self.sender_timeout,
                })
            }
        }
    }

    async fn wait_receiver(&self, receiver: &mut Child) -> Result<()> {
        match timeout(self.receiver_timeout, receiver.wait()).await {
            Ok(Ok(status)) => {
                if !status.success() {
                    warn!("Receiver exited with {}", status);
                }
                Ok(())
            }
            Ok(Err(e)) => Err(BenchError::Io(e)),
            Err(_) => {
                warn!(
                    "Receiver still running after {:?}, terminating it",
                    self.receiver_timeout
                );
                if let Err(e) = receiver.kill().await {
                    warn!("Failed to kill hung receiver: {}", e);
                }
                Err(BenchError::ReceiverTimeout {
                    timeout: self.receiver_timeout,
                })
            }
        }
    }
}

fn spawn_drain(mut stdout: ChildStdout) -> JoinHandle<io::Result<Vec<u8>>> {
    tokio::spawn(async move {
        let mut captured = Vec::new();
        stdout.read_to_end(&mut captured).await?;
        Ok(captured)
    })
}

async fn collect(mut drain: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match timeout(DRAIN_GRACE, &mut drain).await {
        Ok(Ok(captured)) => Ok(captured?),
        Ok(Err(join_error)) => Err(BenchError::Io(io::Error::new(
            io::ErrorKind::Other,
            join_error,
        ))),
        Err(_) => {
            drain.abort();
            Err(BenchError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "receiver output pipe stayed open after exit",
            )))
        }
    }
}

#[async_trait]
impl TrialExecutor for ProcessTrialRunner {
    async fn run(
        &self,
        adapter: &dyn ProtocolAdapter,
        config: &TransportConfig,
        trial_count: usize,
        port: u16,
        host: &str,
    ) -> Result<TrialBatchOutcome> {
        let receiver_spec = adapter.build_receiver_command(config, port)?;
        let sender_spec = adapter.build_sender_command(config, port, host, trial_count)?;

        debug!("Starting receiver: {}", receiver_spec);
        let mut receiver = Self::spawn_receiver(&receiver_spec)?;
        let stdout = receiver.stdout.take().ok_or_else(|| {
            BenchError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "receiver stdout was not captured",
            ))
        })?;
        let drain = spawn_drain(stdout);

        debug!("Starting sender: {}", sender_spec);
        if let Err(e) = self.run_sender(&sender_spec).await {
            drain.abort();
            if let Err(kill_err) = receiver.kill().await {
                warn!("Failed to kill receiver after sender error: {}", kill_err);
            }
            return Err(e);
        }

        if let Err(e) = self.wait_receiver(&mut receiver).await {
            drain.abort();
            return Err(e);
        }
        let captured = collect(drain).await?;

        let outcome = adapter.parse_output(&captured)?;
        outcome.ensure_complete(trial_count)?;

        if !outcome.average_is_consistent(AVERAGE_TOLERANCE) {
            warn!(
                "{}: reported average {:.6} ms differs from trial mean {:.6} ms",
                config.label(),
                outcome.average.time_ms,
                outcome.computed_mean_time().unwrap_or_default()
            );
        }
        Ok(outcome)
    }
}
