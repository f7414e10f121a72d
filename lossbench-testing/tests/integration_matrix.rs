//! Matrix orchestration against deterministic stubs.
//!
//! No processes are launched here; the scripted executor feeds canned
//! receiver output through the real parser.

use std::collections::HashSet;

use lossbench_core::{BenchError, CongestionAlgorithm, LossLevel, TransportConfig, TrialResult};
use lossbench_engine::{BenchConfig, IncompleteBatchPolicy, LossController};
use lossbench_testing::{
    init_test_tracing, loss_levels, reference_trials, reno_cubic_configs, scripted_runner,
    CellFault, ImpairmentEvent, ScriptedExecutor, SimulatedImpairment,
};

fn config() -> BenchConfig {
    BenchConfig::default().with_trial_count(3)
}

fn rudp_reno() -> Vec<TransportConfig> {
    vec![
        TransportConfig::Rudp,
        TransportConfig::tcp(CongestionAlgorithm::Reno, CongestionAlgorithm::Reno),
    ]
}

fn loss(p: u8) -> LossLevel {
    LossLevel::new(p).unwrap()
}

#[tokio::test]
async fn test_fixed_stub_fills_both_tables() {
    init_test_tracing();

    let executor = ScriptedExecutor::new()
        .with_trials("RUDP", reference_trials())
        .with_trials("TCP R:reno S:reno", vec![TrialResult::new(4.0, 50.0); 3]);
    let (mut runner, _) = scripted_runner(config(), executor, SimulatedImpairment::new());

    let report = runner
        .run_matrix(&loss_levels(&[0, 5]), &rudp_reno())
        .await
        .unwrap();

    assert_eq!(report.time_table.get("RUDP", loss(0)), Some(20.0));
    assert_eq!(report.time_table.get("RUDP", loss(5)), Some(20.0));
    assert_eq!(report.bandwidth_table.get("RUDP", loss(0)), Some(5.0));
    assert_eq!(report.bandwidth_table.get("RUDP", loss(5)), Some(5.0));
    assert_eq!(report.time_table.get("TCP R:reno S:reno", loss(5)), Some(4.0));
    assert_eq!(report.bandwidth_table.get("TCP R:reno S:reno", loss(0)), Some(50.0));
    assert!(report.failures.is_empty());
    assert_eq!(report.time_table.len(), 4);
}

#[tokio::test]
async fn test_reset_runs_once_after_last_cell() {
    let executor = ScriptedExecutor::new();
    let (mut runner, handle) =
        scripted_runner(config(), executor.clone(), SimulatedImpairment::new());

    runner
        .run_matrix(&loss_levels(&[0, 5]), &rudp_reno())
        .await
        .unwrap();

    assert_eq!(handle.reset_count(), 1);
    assert_eq!(handle.events().last(), Some(&ImpairmentEvent::Reset));
    assert_eq!(
        handle.events(),
        vec![
            ImpairmentEvent::Initialize,
            ImpairmentEvent::SetLoss(loss(0)),
            ImpairmentEvent::SetLoss(loss(5)),
            ImpairmentEvent::Reset,
        ]
    );
    assert_eq!(runner.impairment().current_loss(), Some(LossLevel::ZERO));
    assert_eq!(executor.calls().len(), 4);
}

#[tokio::test]
async fn test_reset_runs_once_on_fatal_abort() {
    let executor = ScriptedExecutor::new();
    let impairment = SimulatedImpairment::new().fail_at(loss(5));
    let (mut runner, handle) = scripted_runner(config(), executor.clone(), impairment);

    let err = runner
        .run_matrix(&loss_levels(&[0, 5, 10]), &rudp_reno())
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::Impairment { .. }));
    assert_eq!(handle.reset_count(), 1);
    assert_eq!(handle.events().last(), Some(&ImpairmentEvent::Reset));
    // Nothing ran under the unknown network condition.
    assert!(executor.calls().iter().all(|c| c.loss == Some(loss(0))));
    assert_eq!(executor.calls().len(), 2);
    assert!(!handle.events().contains(&ImpairmentEvent::SetLoss(loss(10))));
}

#[tokio::test]
async fn test_failed_reset_is_reported() {
    let impairment = SimulatedImpairment::new().fail_reset();
    let (mut runner, handle) = scripted_runner(config(), ScriptedExecutor::new(), impairment);

    let err = runner
        .run_matrix(&loss_levels(&[0]), &rudp_reno())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "impairment");
    assert_eq!(handle.reset_count(), 1);
}

#[tokio::test]
async fn test_install_failure_does_not_abort() {
    let impairment = SimulatedImpairment::new().fail_initialize();
    let (mut runner, _) = scripted_runner(config(), ScriptedExecutor::new(), impairment);

    let report = runner
        .run_matrix(&loss_levels(&[0, 2]), &rudp_reno())
        .await
        .unwrap();
    assert_eq!(report.time_table.len(), 4);
}

#[tokio::test]
async fn test_tcp_labels_cover_full_product() {
    let (mut runner, _) =
        scripted_runner(config(), ScriptedExecutor::new(), SimulatedImpairment::new());
    let configs =
        TransportConfig::tcp_matrix(&[CongestionAlgorithm::Reno, CongestionAlgorithm::Cubic]);
    let losses = loss_levels(&[0, 2, 5, 10]);

    let report = runner.run_matrix(&losses, &configs).await.unwrap();

    let labels: HashSet<&String> = report.time_table.rows().iter().collect();
    assert_eq!(labels.len(), 4);
    assert_eq!(report.time_table.rows().len(), 4);
    for label in report.time_table.rows() {
        for &level in &losses {
            assert!(report.time_table.get(label, level).is_some());
            assert!(report.bandwidth_table.get(label, level).is_some());
        }
    }
    assert_eq!(report.time_table.len(), 16);
}

#[tokio::test]
async fn test_rerun_yields_identical_tables() {
    let executor = ScriptedExecutor::new()
        .with_trials("RUDP", reference_trials())
        .with_fault_at("TCP R:cubic S:reno", loss(2), CellFault::MissingAverage);
    let (mut runner, handle) = scripted_runner(config(), executor, SimulatedImpairment::new());
    let losses = loss_levels(&[0, 2]);
    let configs = reno_cubic_configs();

    let first = runner.run_matrix(&losses, &configs).await.unwrap();
    let second = runner.run_matrix(&losses, &configs).await.unwrap();

    assert_eq!(first.time_table, second.time_table);
    assert_eq!(first.bandwidth_table, second.bandwidth_table);
    assert_eq!(first.failures, second.failures);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(handle.reset_count(), 2);
}

#[tokio::test]
async fn test_missing_average_leaves_no_cell() {
    let executor = ScriptedExecutor::new()
        .with_trials("RUDP", reference_trials())
        .with_fault_at("RUDP", loss(5), CellFault::MissingAverage);
    let (mut runner, _) = scripted_runner(config(), executor, SimulatedImpairment::new());

    let report = runner
        .run_matrix(&loss_levels(&[0, 5]), &rudp_reno())
        .await
        .unwrap();

    assert_eq!(report.time_table.get("RUDP", loss(0)), Some(20.0));
    assert_eq!(report.time_table.get("RUDP", loss(5)), None);
    assert_eq!(report.bandwidth_table.get("RUDP", loss(5)), None);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.label, "RUDP");
    assert_eq!(failure.loss, loss(5));
    assert!(failure.kind == "parse" || failure.kind == "incomplete_batch");
    // The skipped cell still occupies its place in the table layout.
    assert!(report.time_table.columns().contains(&loss(5)));
    assert!(report.time_table.to_string().contains('-'));
}

#[tokio::test]
async fn test_incomplete_batch_is_skipped_by_default() {
    let executor = ScriptedExecutor::new()
        .with_fault("TCP R:reno S:reno", CellFault::DroppedTrials { missing: 1 });
    let (mut runner, _) = scripted_runner(config(), executor, SimulatedImpairment::new());

    let report = runner
        .run_matrix(&loss_levels(&[0, 5]), &rudp_reno())
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.kind == "incomplete_batch"));
    assert!(report.failures[0].message.contains("expected 4 rows, got 3"));
    assert_eq!(report.time_table.get("TCP R:reno S:reno", loss(0)), None);
    assert!(report.time_table.get("RUDP", loss(5)).is_some());
}

#[tokio::test]
async fn test_incomplete_batch_can_abort_the_run() {
    let executor =
        ScriptedExecutor::new().with_fault("RUDP", CellFault::DroppedTrials { missing: 2 });
    let config = config().with_incomplete_batch_policy(IncompleteBatchPolicy::Abort);
    let (mut runner, handle) =
        scripted_runner(config, executor.clone(), SimulatedImpairment::new());

    let err = runner
        .run_matrix(&loss_levels(&[0, 5]), &rudp_reno())
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::IncompleteBatch { expected: 4, actual: 2 }));
    assert_eq!(err.discrepancy(), Some(2));
    assert_eq!(executor.calls().len(), 1);
    assert_eq!(handle.reset_count(), 1);
}

#[tokio::test]
async fn test_non_fatal_faults_do_not_stop_the_matrix() {
    let executor = ScriptedExecutor::new()
        .with_fault_at("RUDP", loss(0), CellFault::Garbage)
        .with_fault_at("TCP R:reno S:reno", loss(0), CellFault::ReceiverHang)
        .with_fault_at("RUDP", loss(2), CellFault::LaunchFailure);
    let (mut runner, _) = scripted_runner(config(), executor.clone(), SimulatedImpairment::new());

    let report = runner
        .run_matrix(&loss_levels(&[0, 2]), &rudp_reno())
        .await
        .unwrap();

    let kinds: Vec<&str> = report.failures.iter().map(|f| f.kind.as_str()).collect();
    assert_eq!(kinds, vec!["parse", "receiver_timeout", "process_launch"]);
    assert_eq!(report.time_table.len(), 1);
    assert!(report.time_table.get("TCP R:reno S:reno", loss(2)).is_some());
    assert_eq!(executor.calls().len(), 4);
}

#[tokio::test]
async fn test_consecutive_launch_failures_escalate() {
    let executor = ScriptedExecutor::new()
        .with_fault("RUDP", CellFault::LaunchFailure)
        .with_fault("TCP R:reno S:reno", CellFault::LaunchFailure);
    let config = config().with_max_consecutive_launch_failures(3);
    let (mut runner, handle) =
        scripted_runner(config, executor.clone(), SimulatedImpairment::new());

    let err = runner
        .run_matrix(&loss_levels(&[0, 2, 5]), &rudp_reno())
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::TooManyFailures { count: 3, .. }));
    assert!(err.is_fatal());
    assert_eq!(executor.calls().len(), 3);
    assert_eq!(handle.reset_count(), 1);
}

#[tokio::test]
async fn test_success_breaks_launch_failure_streak() {
    let executor = ScriptedExecutor::new().with_fault("RUDP", CellFault::LaunchFailure);
    let config = config().with_max_consecutive_launch_failures(2);
    let (mut runner, _) = scripted_runner(config, executor, SimulatedImpairment::new());

    let report = runner
        .run_matrix(&loss_levels(&[0, 2, 5]), &rudp_reno())
        .await
        .unwrap();
    assert_eq!(report.failures.len(), 3);
}

#[tokio::test]
async fn test_cells_run_under_their_loss_level_in_order() {
    let executor = ScriptedExecutor::new();
    let (mut runner, _) = scripted_runner(config(), executor.clone(), SimulatedImpairment::new());
    let configs = reno_cubic_configs();

    runner
        .run_matrix(&loss_levels(&[10, 0, 5]), &configs)
        .await
        .unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 15);
    let observed: Vec<(Option<LossLevel>, String)> =
        calls.iter().map(|c| (c.loss, c.label.clone())).collect();
    let expected: Vec<(Option<LossLevel>, String)> = [10, 0, 5]
        .iter()
        .flat_map(|&p| configs.iter().map(move |c| (Some(loss(p)), c.label())))
        .collect();
    assert_eq!(observed, expected);

    assert_eq!(calls[0].adapter, "stub-rudp");
    assert_eq!(calls[1].adapter, "stub-tcp");
    assert!(calls.iter().all(|c| c.trial_count == 3 && c.port == 5000 && c.host == "127.0.0.1"));
}

#[tokio::test]
async fn test_invalid_config_touches_nothing() {
    let (mut runner, handle) = scripted_runner(
        BenchConfig::default().with_trial_count(0),
        ScriptedExecutor::new(),
        SimulatedImpairment::new(),
    );
    let err = runner
        .run_matrix(&loss_levels(&[0]), &rudp_reno())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "config");
    assert!(handle.events().is_empty());
}

#[tokio::test]
async fn test_run_uses_configured_matrix() {
    let config = BenchConfig::default()
        .with_trial_count(2)
        .with_loss_levels(loss_levels(&[0, 10]))
        .with_algorithms(vec![CongestionAlgorithm::Bbr]);
    let (mut runner, _) =
        scripted_runner(config, ScriptedExecutor::new(), SimulatedImpairment::new());

    assert_eq!(runner.config().trial_count, 2);
    assert_eq!(runner.config().transport_configs().len(), 2);

    let report = runner.run().await.unwrap();
    assert_eq!(report.time_table.rows(), ["RUDP".to_string(), "TCP R:bbr S:bbr".to_string()]);
    assert_eq!(report.time_table.columns(), [loss(0), loss(10)]);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["time_table"]["cells"]["RUDP"].is_object());
}
