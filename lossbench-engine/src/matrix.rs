use lossbench_core::{
    adapter::AdapterSet, BenchError, LossLevel, ResultTable, Result, RunId, TransportConfig,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::{BenchConfig, IncompleteBatchPolicy, LossController, ResultAggregator, TrialExecutor};

/// A matrix cell that produced no result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellFailure {
    pub label: String,
    pub loss: LossLevel,
    pub kind: String,
    pub message: String,
}

/// Finished tables of one matrix run plus every skipped cell.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixReport {
    pub run_id: RunId,
    pub time_table: ResultTable,
    pub bandwidth_table: ResultTable,
    pub failures: Vec<CellFailure>,
    pub elapsed: Duration,
}

/// Walks loss levels x transport configurations one cell at a time.
///
/// Cells run strictly sequentially: every batch reuses the same port and the
/// loss level is global to the host, so only one cell may be in flight.
pub struct MatrixRunner<LC, TE>
where
    LC: LossController,
    TE: TrialExecutor,
{
    config: BenchConfig,
    adapters: AdapterSet,
    impairment: LC,
    executor: TE,
}

impl<LC, TE> MatrixRunner<LC, TE>
where
    LC: LossController,
    TE: TrialExecutor,
{
    pub fn new(config: BenchConfig, adapters: AdapterSet, impairment: LC, executor: TE) -> Self {
        Self {
            config,
            adapters,
            impairment,
            executor,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn impairment(&self) -> &LC {
        &self.impairment
    }

    /// Runs the matrix described by the configuration.
    pub async fn run(&mut self) -> Result<MatrixReport> {
        let loss_levels = self.config.loss_levels.clone();
        let configs = self.config.transport_configs();
        self.run_matrix(&loss_levels, &configs).await
    }

    /// Runs every `(loss, config)` cell in the given order.
    ///
    /// The loss rule is reset to zero once the matrix finishes, whether it
    /// completed or was aborted by a fatal error.
    pub async fn run_matrix(
        &mut self,
        loss_levels: &[LossLevel],
        configs: &[TransportConfig],
    ) -> Result<MatrixReport> {
        self.config.validate()?;

        let run_id = RunId::new();
        let started = Instant::now();
        info!(
            "Starting run {}: {} loss levels x {} configurations, {} trials each",
            run_id,
            loss_levels.len(),
            configs.len(),
            self.config.trial_count
        );

        let outcome = self.execute(loss_levels, configs).await;
        let reset = self.impairment.reset().await;

        match (outcome, reset) {
            (Ok((aggregator, failures)), Ok(())) => {
                let (time_table, bandwidth_table) = aggregator.finalize();
                let elapsed = started.elapsed();
                info!(
                    "Run {} finished in {:?}: {} cells recorded, {} skipped",
                    run_id,
                    elapsed,
                    time_table.len(),
                    failures.len()
                );
                Ok(MatrixReport {
                    run_id,
                    time_table,
                    bandwidth_table,
                    failures,
                    elapsed,
                })
            }
            (Ok(_), Err(reset_error)) => {
                error!("Run {}: failed to reset loss to 0%: {}", run_id, reset_error);
                Err(reset_error)
            }
            (Err(e), Ok(())) => {
                error!("Run {} aborted: {}", run_id, e);
                Err(e)
            }
            (Err(e), Err(reset_error)) => {
                error!(
                    "Run {} aborted: {}; resetting loss also failed: {}",
                    run_id, e, reset_error
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &mut self,
        loss_levels: &[LossLevel],
        configs: &[TransportConfig],
    ) -> Result<(ResultAggregator, Vec<CellFailure>)> {
        self.impairment.initialize().await?;

        let labels: Vec<String> = configs.iter().map(TransportConfig::label).collect();
        let mut aggregator = ResultAggregator::new();
        aggregator.declare(&labels, loss_levels);

        let mut failures = Vec::new();
        let mut consecutive_launch_failures = 0usize;

        for &loss in loss_levels {
            self.impairment.set_loss(loss).await?;
            info!("Set loss as {}", loss);

            for (config, label) in configs.iter().zip(&labels) {
                let adapter = self.adapters.for_config(config);
                let result = self
                    .executor
                    .run(
                        adapter,
                        config,
                        self.config.trial_count,
                        self.config.port,
                        &self.config.host,
                    )
                    .await;

                match result {
                    Ok(outcome) => {
                        consecutive_launch_failures = 0;
                        info!(
                            "Tested {} {} times at {} loss: average {:.3} ms, {:.3} MB/s",
                            label,
                            self.config.trial_count,
                            loss,
                            outcome.average.time_ms,
                            outcome.average.speed_mbps
                        );
                        aggregator.record(
                            label,
                            loss,
                            outcome.average.time_ms,
                            outcome.average.speed_mbps,
                        );
                    }
                    Err(e) => {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        if matches!(e, BenchError::IncompleteBatch { .. })
                            && self.config.incomplete_batch_policy == IncompleteBatchPolicy::Abort
                        {
                            return Err(e);
                        }

                        match e.discrepancy() {
                            Some(missing) => warn!(
                                "Skipping {} at {} loss: {} (discrepancy {})",
                                label, loss, e, missing
                            ),
                            None => warn!("Skipping {} at {} loss: {}", label, loss, e),
                        }

                        let launch_failure = e.is_launch_failure();
                        failures.push(CellFailure {
                            label: label.clone(),
                            loss,
                            kind: e.kind().to_string(),
                            message: e.to_string(),
                        });

                        if launch_failure {
                            consecutive_launch_failures += 1;
                            let limit = self.config.max_consecutive_launch_failures;
                            if consecutive_launch_failures >= limit {
                                return Err(BenchError::TooManyFailures {
                                    count: consecutive_launch_failures,
                                    last: e.to_string(),
                                });
                            }
                        } else {
                            consecutive_launch_failures = 0;
                        }
                    }
                }
            }
        }

        Ok((aggregator, failures))
    }
}
