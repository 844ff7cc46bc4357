//! Cancellable units of control work.
//!
//! An [`Action`] is bound to one subsystem and follows a strict lifecycle:
//! `start()` once, `run()` once per tick until [`Action::is_done`], and
//! `cancel()` at any point. Implementors only provide the `on_*` hooks; the
//! provided lifecycle methods own the `done` flag and the diagnostics.
//!
//! ## Done invariant
//!
//! Once `done` is set it stays set until the next `start()`. `run()` on a
//! done action is a no-op and `cancel()` on a done action does nothing, which
//! makes cancellation idempotent.
//!
//! ## Combinators
//!
//! - [`sequence::SequenceAction`]: children one after another
//! - [`parallel::ParallelAction`]: children side by side
//! - [`dispatch::DispatchAction`]: hand an action to another subsystem

pub mod basic;
pub mod dispatch;
pub mod parallel;
pub mod sequence;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::clock::Clock;
use crate::error::ActionError;
use crate::subsystem::SubsystemId;
use crate::subsystem::tree::SubsystemTree;

/// Monotonically increasing action identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Source of [`ActionId`]s, owned by the robot context and created once at
/// boot. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ActionIds {
    last: Rc<Cell<u64>>,
}

impl ActionIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id.
    pub fn next(&self) -> ActionId {
        let id = self.last.get() + 1;
        self.last.set(id);
        ActionId(id)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.last.get()
    }
}

/// State shared by every action: identity, target subsystem and the done flag.
#[derive(Debug, Clone)]
pub struct ActionCore {
    id: ActionId,
    subsystem: SubsystemId,
    name: &'static str,
    done: bool,
}

impl ActionCore {
    pub fn new(ids: &ActionIds, subsystem: SubsystemId, name: &'static str) -> Self {
        Self {
            id: ids.next(),
            subsystem,
            name,
            done: false,
        }
    }

    #[inline]
    pub const fn id(&self) -> ActionId {
        self.id
    }

    #[inline]
    pub const fn subsystem(&self) -> SubsystemId {
        self.subsystem
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn rename(&mut self, name: &'static str) {
        self.name = name;
    }

    #[inline]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Terminate the action. Never reverts until the next `start()`.
    #[inline]
    pub fn set_done(&mut self) {
        self.done = true;
    }

    fn reset(&mut self) {
        self.done = false;
    }
}

/// Everything an action may touch during one lifecycle call.
pub struct ActionContext<'a> {
    pub tree: &'a mut SubsystemTree,
    pub clock: &'a Clock,
}

impl<'a> ActionContext<'a> {
    pub fn new(tree: &'a mut SubsystemTree, clock: &'a Clock) -> Self {
        Self { tree, clock }
    }
}

/// A unit of cancellable, non-blocking work bound to one subsystem.
pub trait Action {
    fn core(&self) -> &ActionCore;

    fn core_mut(&mut self) -> &mut ActionCore;

    /// Called by `start()` after `done` has been cleared.
    fn on_start(&mut self, _ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        Ok(())
    }

    /// One tick of work. Must return promptly; call `set_done()` to finish.
    fn on_run(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError>;

    /// Undo any actuator output this action set.
    fn on_cancel(&mut self, _ctx: &mut ActionContext<'_>) {}

    #[inline]
    fn id(&self) -> ActionId {
        self.core().id()
    }

    #[inline]
    fn name(&self) -> &'static str {
        self.core().name()
    }

    #[inline]
    fn subsystem(&self) -> SubsystemId {
        self.core().subsystem()
    }

    #[inline]
    fn is_done(&self) -> bool {
        self.core().is_done()
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        self.core_mut().reset();
        debug!(
            action = self.name(),
            action_id = %self.id(),
            subsystem = %self.subsystem(),
            "action started"
        );
        self.on_start(ctx)?;
        if self.is_done() {
            debug!(action = self.name(), action_id = %self.id(), "action done at start");
        }
        Ok(())
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        if self.is_done() {
            return Ok(());
        }
        self.on_run(ctx)?;
        if self.is_done() {
            debug!(action = self.name(), action_id = %self.id(), "action done");
        }
        Ok(())
    }

    fn cancel(&mut self, ctx: &mut ActionContext<'_>) {
        if self.is_done() {
            return;
        }
        self.on_cancel(ctx);
        self.core_mut().set_done();
        debug!(
            action = self.name(),
            action_id = %self.id(),
            subsystem = %self.subsystem(),
            "action cancelled"
        );
    }

    fn boxed(self) -> BoxedAction
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

pub type BoxedAction = Box<dyn Action>;
