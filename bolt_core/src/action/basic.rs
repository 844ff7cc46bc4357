//! Leaf actions used to glue programs together.

use std::time::Duration;

use crate::action::{Action, ActionContext, ActionCore, ActionIds};
use crate::error::ActionError;
use crate::subsystem::SubsystemId;

type Effect = Box<dyn FnMut(&mut ActionContext<'_>) -> Result<(), ActionError>>;

/// Runs a closure once at start and is done immediately.
pub struct InstantAction {
    core: ActionCore,
    effect: Effect,
}

impl InstantAction {
    pub fn new(
        ids: &ActionIds,
        subsystem: SubsystemId,
        name: &'static str,
        effect: impl FnMut(&mut ActionContext<'_>) -> Result<(), ActionError> + 'static,
    ) -> Self {
        Self {
            core: ActionCore::new(ids, subsystem, name),
            effect: Box::new(effect),
        }
    }
}

impl Action for InstantAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        (self.effect)(ctx)?;
        self.core.set_done();
        Ok(())
    }

    fn on_run(&mut self, _ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        self.core.set_done();
        Ok(())
    }
}

/// Done once strictly more than `duration` has elapsed since start.
pub struct WaitAction {
    core: ActionCore,
    duration: Duration,
    started_at: Duration,
}

impl WaitAction {
    pub fn new(ids: &ActionIds, subsystem: SubsystemId, duration: Duration) -> Self {
        Self {
            core: ActionCore::new(ids, subsystem, "Wait"),
            duration,
            started_at: Duration::ZERO,
        }
    }
}

impl Action for WaitAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        self.started_at = ctx.clock.now();
        Ok(())
    }

    fn on_run(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        if ctx.clock.elapsed_since(self.started_at) > self.duration {
            self.core.set_done();
        }
        Ok(())
    }
}

/// Default action that zeroes its mechanism and then holds forever.
pub struct IdleAction {
    core: ActionCore,
}

impl IdleAction {
    pub fn new(ids: &ActionIds, subsystem: SubsystemId) -> Self {
        Self {
            core: ActionCore::new(ids, subsystem, "Idle"),
        }
    }
}

impl Action for IdleAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        ctx.tree.stop_mechanism(self.subsystem());
        Ok(())
    }

    fn on_run(&mut self, _ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        Ok(())
    }
}
