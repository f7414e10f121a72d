//! Proptest strategies for benchmark data.

use lossbench_core::{CongestionAlgorithm, LossLevel, TrialResult};
use proptest::prelude::*;

/// Realistic single-transfer measurements: 0.1 ms to 10 s, 0.01 to 10 000 MB/s.
pub fn trial() -> impl Strategy<Value = TrialResult> {
    (0.1f64..10_000.0, 0.01f64..10_000.0).prop_map(|(time, speed)| TrialResult::new(time, speed))
}

pub fn trials(max: usize) -> impl Strategy<Value = Vec<TrialResult>> {
    proptest::collection::vec(trial(), 1..=max)
}

pub fn loss_level() -> impl Strategy<Value = LossLevel> {
    (0u8..=100).prop_map(|p| LossLevel::new(p).unwrap_or(LossLevel::ZERO))
}

/// Distinct loss levels in ascending order.
pub fn loss_levels(max: usize) -> impl Strategy<Value = Vec<LossLevel>> {
    proptest::collection::btree_set(loss_level(), 1..=max).prop_map(|set| set.into_iter().collect())
}

pub fn algorithms() -> impl Strategy<Value = Vec<CongestionAlgorithm>> {
    proptest::sample::subsequence(
        vec![
            CongestionAlgorithm::Reno,
            CongestionAlgorithm::Cubic,
            CongestionAlgorithm::Bbr,
            CongestionAlgorithm::Vegas,
        ],
        1..=4,
    )
}
