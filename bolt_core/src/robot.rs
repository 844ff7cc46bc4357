//! Process-wide robot context and the per-tick host contract.
//!
//! One [`Robot`] is created at boot. It owns the subsystem tree, the clock
//! and the action-id source, and [`Robot::tick`] performs one period of the
//! host loop:
//!
//! 1. `clock.update(now)`
//! 2. `compute_state()` on every subsystem (top-down)
//! 3. the active [`Controller`] issues commands
//! 4. `run()` on every subsystem (top-down)

use std::time::Duration;

use tracing::{info, warn};

use crate::action::{ActionIds, BoxedAction};
use crate::clock::Clock;
use crate::error::{ActionError, Rejection};
use crate::subsystem::SubsystemId;
use crate::subsystem::tree::SubsystemTree;

/// What a controller may touch during its turn in the tick.
pub struct ControlContext<'a> {
    pub tree: &'a mut SubsystemTree,
    pub ids: &'a ActionIds,
    pub clock: &'a Clock,
}

impl ControlContext<'_> {
    pub fn set_action(
        &mut self,
        id: SubsystemId,
        action: BoxedAction,
        parent_busy_ok: bool,
    ) -> Result<(), Rejection> {
        self.tree.set_action(id, action, parent_busy_ok, self.clock)
    }

    pub fn cancel_action(&mut self, id: SubsystemId) -> Result<(), Rejection> {
        self.tree.cancel_action(id, self.clock)
    }
}

/// High-level command source (teleop, autonomous routine, ...).
///
/// Which controller runs is decided by the host; the core only calls it once
/// per tick between sampling and running the tree.
pub trait Controller {
    fn name(&self) -> &'static str;

    fn run(&mut self, ctx: &mut ControlContext<'_>) -> Result<(), ActionError>;
}

/// Controller that never issues a command.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullController;

impl Controller for NullController {
    fn name(&self) -> &'static str {
        "null"
    }

    fn run(&mut self, _ctx: &mut ControlContext<'_>) -> Result<(), ActionError> {
        Ok(())
    }
}

pub struct Robot {
    tree: SubsystemTree,
    clock: Clock,
    ids: ActionIds,
    ticks: u64,
}

impl Robot {
    pub fn new(tree: SubsystemTree, ids: ActionIds) -> Self {
        Self {
            tree,
            clock: Clock::new(),
            ids,
            ticks: 0,
        }
    }

    #[inline]
    pub fn tree(&self) -> &SubsystemTree {
        &self.tree
    }

    #[inline]
    pub fn tree_mut(&mut self) -> &mut SubsystemTree {
        &mut self.tree
    }

    #[inline]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    #[inline]
    pub fn ids(&self) -> &ActionIds {
        &self.ids
    }

    /// Ticks completed since boot.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one host period at time `now`.
    ///
    /// A failing controller is logged and skipped; the tree still runs.
    pub fn tick(&mut self, now: Duration, controller: &mut dyn Controller) {
        self.clock.update(now);
        self.tree.compute_state(&self.clock);

        let mut ctx = ControlContext {
            tree: &mut self.tree,
            ids: &self.ids,
            clock: &self.clock,
        };
        if let Err(err) = controller.run(&mut ctx) {
            warn!(controller = controller.name(), error = %err, "controller failed");
        }

        self.tree.run(&self.clock);
        self.ticks += 1;
    }

    pub fn set_action(
        &mut self,
        id: SubsystemId,
        action: BoxedAction,
        parent_busy_ok: bool,
    ) -> Result<(), Rejection> {
        self.tree.set_action(id, action, parent_busy_ok, &self.clock)
    }

    pub fn cancel_action(&mut self, id: SubsystemId) -> Result<(), Rejection> {
        self.tree.cancel_action(id, &self.clock)
    }

    pub fn set_default_action(&mut self, id: SubsystemId, action: BoxedAction) -> Result<(), Rejection> {
        self.tree.set_default_action(id, action, &self.clock)
    }

    /// Cancel every action and zero every output.
    pub fn shutdown(&mut self) {
        self.tree.shutdown(&self.clock);
        info!(ticks = self.ticks, "robot stopped");
    }
}
