//! # Lossbench Testing
//!
//! Deterministic stand-ins for the parts of a benchmark run that touch the
//! host: a recording loss controller, a scripted trial executor with fault
//! injection, shell-script stub adapters for the real process runner, and
//! proptest strategies.

pub mod fault_injection;
pub mod impairment_sim;
pub mod scenarios;
pub mod strategies;

pub use fault_injection::{CellFault, ExecutedCell, ScriptedExecutor};
pub use impairment_sim::{ImpairmentEvent, ImpairmentHandle, SimulatedImpairment};
pub use scenarios::{
    init_test_tracing, loss_levels, reference_trials, reno_cubic_configs, scripted_runner,
    stub_adapters, StubAdapter,
};
