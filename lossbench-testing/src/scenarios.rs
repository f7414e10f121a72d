use lossbench_core::{
    adapter::{AdapterSet, ProcessSpec, ProtocolAdapter},
    CongestionAlgorithm, LossLevel, Result, TransportConfig, TrialResult,
};
use lossbench_engine::{BenchConfig, MatrixRunner};
use std::sync::Arc;

use crate::fault_injection::ScriptedExecutor;
use crate::impairment_sim::{ImpairmentHandle, SimulatedImpairment};

/// Adapter whose receiver is a POSIX shell one-liner printing a fixed table
/// and whose sender is `true`. Lets the real process runner be exercised
/// without the transport binaries.
#[derive(Debug, Clone)]
pub struct StubAdapter {
    name: String,
    trials: Vec<TrialResult>,
    print_average: bool,
    sender: String,
}

impl StubAdapter {
    pub fn new(name: impl Into<String>, trials: Vec<TrialResult>) -> Self {
        Self {
            name: name.into(),
            trials,
            print_average: true,
            sender: "true".to_string(),
        }
    }

    /// Omits the `Average` row from the receiver output.
    pub fn without_average(mut self) -> Self {
        self.print_average = false;
        self
    }

    /// Replaces the sender executable.
    pub fn with_sender(mut self, program: impl Into<String>) -> Self {
        self.sender = program.into();
        self
    }

    fn script(&self) -> String {
        let mut body = String::from("Time (ms),Speed (MB/s)\\n");
        for (i, trial) in self.trials.iter().enumerate() {
            body.push_str(&format!("{},{},{}\\n", i, trial.time_ms, trial.speed_mbps));
        }
        if self.print_average {
            let n = self.trials.len().max(1) as f64;
            let time = self.trials.iter().map(|t| t.time_ms).sum::<f64>() / n;
            let speed = self.trials.iter().map(|t| t.speed_mbps).sum::<f64>() / n;
            body.push_str(&format!("Average,{time},{speed}\\n"));
        }
        format!("printf '{body}'")
    }
}

impl ProtocolAdapter for StubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, _config: &TransportConfig) -> bool {
        true
    }

    fn build_receiver_command(&self, _config: &TransportConfig, _port: u16) -> Result<ProcessSpec> {
        Ok(ProcessSpec::new("sh").arg("-c").arg(self.script()))
    }

    fn build_sender_command(
        &self,
        _config: &TransportConfig,
        _port: u16,
        _host: &str,
        _trial_count: usize,
    ) -> Result<ProcessSpec> {
        Ok(ProcessSpec::new(&self.sender))
    }
}

/// Trials of 10, 20 and 30 ms at 5 MB/s.
pub fn reference_trials() -> Vec<TrialResult> {
    vec![
        TrialResult::new(10.0, 5.0),
        TrialResult::new(20.0, 5.0),
        TrialResult::new(30.0, 5.0),
    ]
}

pub fn loss_levels(percentages: &[u8]) -> Vec<LossLevel> {
    percentages
        .iter()
        .filter_map(|&p| LossLevel::new(p).ok())
        .collect()
}

/// Adapter pair of stubs that pass every configuration through.
pub fn stub_adapters(trials: Vec<TrialResult>) -> AdapterSet {
    AdapterSet::new(
        Arc::new(StubAdapter::new("stub-rudp", trials.clone())),
        Arc::new(StubAdapter::new("stub-tcp", trials)),
    )
}

/// RUDP plus every TCP pairing of reno and cubic.
pub fn reno_cubic_configs() -> Vec<TransportConfig> {
    TransportConfig::full_set(true, &[CongestionAlgorithm::Reno, CongestionAlgorithm::Cubic])
}

/// A matrix runner wired to a simulated impairment and a scripted executor,
/// with a handle onto the impairment for assertions.
pub fn scripted_runner(
    config: BenchConfig,
    executor: ScriptedExecutor,
    impairment: SimulatedImpairment,
) -> (MatrixRunner<SimulatedImpairment, ScriptedExecutor>, ImpairmentHandle) {
    let handle = impairment.handle();
    let executor = executor.observing(handle.clone());
    let adapters = stub_adapters(reference_trials());
    (MatrixRunner::new(config, adapters, impairment, executor), handle)
}

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();
}
