//! Property tests over randomly shaped matrices.

use lossbench_core::TransportConfig;
use lossbench_engine::BenchConfig;
use lossbench_testing::{
    scripted_runner, strategies, ImpairmentEvent, ScriptedExecutor, SimulatedImpairment,
};
use proptest::prelude::*;
use tokio_test::block_on;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_cell_is_filled_exactly_once(
        losses in strategies::loss_levels(6),
        algorithms in strategies::algorithms(),
        include_rudp in any::<bool>(),
    ) {
        let configs = TransportConfig::full_set(include_rudp, &algorithms);
        let config = BenchConfig::default().with_trial_count(2);
        let executor = ScriptedExecutor::new();
        let (mut runner, handle) =
            scripted_runner(config, executor.clone(), SimulatedImpairment::new());

        let report = block_on(runner.run_matrix(&losses, &configs)).unwrap();

        prop_assert_eq!(report.time_table.len(), losses.len() * configs.len());
        prop_assert_eq!(report.bandwidth_table.len(), losses.len() * configs.len());
        prop_assert_eq!(executor.calls().len(), losses.len() * configs.len());
        prop_assert_eq!(handle.set_loss_count(), losses.len());
        prop_assert_eq!(handle.reset_count(), 1);
        let events = handle.events();
        prop_assert_eq!(events.last(), Some(&ImpairmentEvent::Reset));
    }

    #[test]
    fn recorded_average_matches_trial_mean(trials in strategies::trials(8)) {
        let n = trials.len();
        let expected_time = trials.iter().map(|t| t.time_ms).sum::<f64>() / n as f64;
        let expected_speed = trials.iter().map(|t| t.speed_mbps).sum::<f64>() / n as f64;

        let config = BenchConfig::default().with_trial_count(n);
        let executor = ScriptedExecutor::new().with_trials("RUDP", trials);
        let (mut runner, _) = scripted_runner(config, executor, SimulatedImpairment::new());

        let losses = lossbench_testing::loss_levels(&[0]);
        let report = block_on(runner.run_matrix(&losses, &[TransportConfig::Rudp])).unwrap();

        let time = report.time_table.get("RUDP", losses[0]).unwrap();
        let speed = report.bandwidth_table.get("RUDP", losses[0]).unwrap();
        prop_assert!((time - expected_time).abs() <= 1e-6 * expected_time.max(1.0));
        prop_assert!((speed - expected_speed).abs() <= 1e-6 * expected_speed.max(1.0));
    }
}
