use async_trait::async_trait;
use lossbench_core::{BenchError, LossLevel, Result};
use lossbench_engine::LossController;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Calls observed by a [`SimulatedImpairment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImpairmentEvent {
    Initialize,
    SetLoss(LossLevel),
    Reset,
}

#[derive(Debug, Default)]
struct ImpairmentState {
    active: Option<LossLevel>,
    events: Vec<ImpairmentEvent>,
    failing_levels: HashSet<LossLevel>,
    fail_initialize: bool,
    fail_reset: bool,
}

/// Cloneable view of a simulated controller's state.
///
/// Tests keep a handle while the matrix runner owns the controller, and a
/// scripted executor can read the active level to key its faults.
#[derive(Debug, Clone, Default)]
pub struct ImpairmentHandle {
    state: Arc<Mutex<ImpairmentState>>,
}

impl ImpairmentHandle {
    pub fn active(&self) -> Option<LossLevel> {
        self.state.lock().active
    }

    pub fn events(&self) -> Vec<ImpairmentEvent> {
        self.state.lock().events.clone()
    }

    pub fn reset_count(&self) -> usize {
        self.count(|e| matches!(e, ImpairmentEvent::Reset))
    }

    pub fn set_loss_count(&self) -> usize {
        self.count(|e| matches!(e, ImpairmentEvent::SetLoss(_)))
    }

    fn count(&self, predicate: impl Fn(&ImpairmentEvent) -> bool) -> usize {
        self.state.lock().events.iter().filter(|e| predicate(e)).count()
    }
}

/// In-memory [`LossController`] that records every call.
#[derive(Debug, Clone, Default)]
pub struct SimulatedImpairment {
    handle: ImpairmentHandle,
}

impl SimulatedImpairment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ImpairmentHandle {
        self.handle.clone()
    }

    /// Makes `set_loss(level)` fail as if `tc` had exited non-zero.
    pub fn fail_at(self, level: LossLevel) -> Self {
        self.handle.state.lock().failing_levels.insert(level);
        self
    }

    /// Makes `initialize` fail, as when the rule already exists.
    pub fn fail_initialize(self) -> Self {
        self.handle.state.lock().fail_initialize = true;
        self
    }

    /// Makes `reset` fail.
    pub fn fail_reset(self) -> Self {
        self.handle.state.lock().fail_reset = true;
        self
    }
}

#[async_trait]
impl LossController for SimulatedImpairment {
    async fn initialize(&mut self) -> Result<()> {
        let mut state = self.handle.state.lock();
        state.events.push(ImpairmentEvent::Initialize);
        if !state.fail_initialize {
            state.active = Some(LossLevel::ZERO);
        }
        // Installation failures are tolerated, like the real controller.
        Ok(())
    }

    async fn set_loss(&mut self, loss: LossLevel) -> Result<()> {
        let mut state = self.handle.state.lock();
        state.events.push(ImpairmentEvent::SetLoss(loss));
        if state.failing_levels.contains(&loss) {
            return Err(BenchError::impairment(format!(
                "simulated tc failure at {loss}"
            )));
        }
        debug!("Simulated loss set to {}", loss);
        state.active = Some(loss);
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        let mut state = self.handle.state.lock();
        state.events.push(ImpairmentEvent::Reset);
        if state.fail_reset {
            return Err(BenchError::impairment("simulated reset failure"));
        }
        state.active = Some(LossLevel::ZERO);
        Ok(())
    }

    fn current_loss(&self) -> Option<LossLevel> {
        self.handle.active()
    }
}
