use async_trait::async_trait;
use lossbench_core::{
    adapter::ProtocolAdapter, BenchError, LossLevel, Result, TransportConfig, TrialBatchOutcome,
    TrialResult,
};
use lossbench_engine::TrialExecutor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::impairment_sim::ImpairmentHandle;

/// Failure injected into a single matrix cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellFault {
    /// Receiver output is not a table
    Garbage,
    /// Receiver printed every trial but no `Average` row
    MissingAverage,
    /// Receiver printed `missing` fewer trial rows than requested
    DroppedTrials { missing: usize },
    /// Executable could not be started
    LaunchFailure,
    /// Receiver never exited
    ReceiverHang,
}

/// A call observed by a [`ScriptedExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCell {
    pub label: String,
    pub adapter: String,
    pub loss: Option<LossLevel>,
    pub trial_count: usize,
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Default)]
struct ScriptState {
    outcomes: HashMap<String, (Vec<TrialResult>, TrialResult)>,
    faults: HashMap<(String, Option<LossLevel>), CellFault>,
    calls: Vec<ExecutedCell>,
}

/// Deterministic [`TrialExecutor`] returning scripted receiver output.
///
/// Every configuration label maps to a fixed set of trial rows. Faults are
/// keyed by label and, optionally, the loss level active in the attached
/// [`ImpairmentHandle`]. Outputs pass through the adapter's real parser and
/// the same row-count check as the process runner.
#[derive(Debug, Clone)]
pub struct ScriptedExecutor {
    impairment: Option<ImpairmentHandle>,
    default_trial: TrialResult,
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            impairment: None,
            default_trial: TrialResult::new(10.0, 1.0),
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Lets faults be keyed by the currently applied loss level.
    pub fn observing(mut self, impairment: ImpairmentHandle) -> Self {
        self.impairment = Some(impairment);
        self
    }

    /// Scripts the trial rows for `label`; the average row is their mean.
    pub fn with_trials(self, label: impl Into<String>, trials: Vec<TrialResult>) -> Self {
        let average = mean_row(&trials);
        self.state.lock().outcomes.insert(label.into(), (trials, average));
        self
    }

    /// Injects a fault for `label` at every loss level.
    pub fn with_fault(self, label: impl Into<String>, fault: CellFault) -> Self {
        self.state.lock().faults.insert((label.into(), None), fault);
        self
    }

    /// Injects a fault for `label` at a single loss level.
    pub fn with_fault_at(
        self,
        label: impl Into<String>,
        loss: LossLevel,
        fault: CellFault,
    ) -> Self {
        self.state
            .lock()
            .faults
            .insert((label.into(), Some(loss)), fault);
        self
    }

    pub fn calls(&self) -> Vec<ExecutedCell> {
        self.state.lock().calls.clone()
    }

    fn render(&self, label: &str, trial_count: usize, fault: Option<&CellFault>) -> Vec<u8> {
        let state = self.state.lock();
        let (scripted, average) = match state.outcomes.get(label) {
            Some((trials, average)) => (trials.clone(), *average),
            None => (vec![self.default_trial; trial_count], self.default_trial),
        };

        let rows = match fault {
            Some(CellFault::DroppedTrials { missing }) => trial_count.saturating_sub(*missing),
            _ => trial_count,
        };

        let mut out = String::from("Time (ms),Speed (MB/s)\n");
        for (i, trial) in scripted.iter().cycle().take(rows).enumerate() {
            out.push_str(&format!("{},{:.6},{:.6}\n", i, trial.time_ms, trial.speed_mbps));
        }
        if fault != Some(&CellFault::MissingAverage) {
            out.push_str(&format!(
                "Average,{:.6},{:.6}\n",
                average.time_ms, average.speed_mbps
            ));
        }
        out.into_bytes()
    }
}

fn mean_row(trials: &[TrialResult]) -> TrialResult {
    if trials.is_empty() {
        return TrialResult::new(0.0, 0.0);
    }
    let n = trials.len() as f64;
    TrialResult::new(
        trials.iter().map(|t| t.time_ms).sum::<f64>() / n,
        trials.iter().map(|t| t.speed_mbps).sum::<f64>() / n,
    )
}

#[async_trait]
impl TrialExecutor for ScriptedExecutor {
    async fn run(
        &self,
        adapter: &dyn ProtocolAdapter,
        config: &TransportConfig,
        trial_count: usize,
        port: u16,
        host: &str,
    ) -> Result<TrialBatchOutcome> {
        // Same contract checks as a real launch.
        adapter.build_receiver_command(config, port)?;
        adapter.build_sender_command(config, port, host, trial_count)?;

        let label = config.label();
        let loss = self.impairment.as_ref().and_then(ImpairmentHandle::active);
        let fault = {
            let mut state = self.state.lock();
            state.calls.push(ExecutedCell {
                label: label.clone(),
                adapter: adapter.name().to_string(),
                loss,
                trial_count,
                port,
                host: host.to_string(),
            });
            state
                .faults
                .get(&(label.clone(), loss))
                .or_else(|| state.faults.get(&(label.clone(), None)))
                .cloned()
        };

        match &fault {
            Some(CellFault::Garbage) => {
                return adapter.parse_output(b"segmentation fault (core dumped)\n");
            }
            Some(CellFault::LaunchFailure) => {
                return Err(BenchError::launch(
                    "receiver",
                    adapter.name(),
                    io::Error::new(io::ErrorKind::NotFound, "simulated missing executable"),
                ));
            }
            Some(CellFault::ReceiverHang) => {
                return Err(BenchError::ReceiverTimeout {
                    timeout: Duration::from_secs(120),
                });
            }
            _ => {}
        }

        let raw = self.render(&label, trial_count, fault.as_ref());
        let outcome = adapter.parse_output(&raw)?;
        outcome.ensure_complete(trial_count)?;
        info!("Scripted {} produced {} trials", label, outcome.trials.len());
        Ok(outcome)
    }
}
