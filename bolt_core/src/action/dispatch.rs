//! Hand an action to another subsystem.
//!
//! A non-blocking dispatch is a fire-and-forget ownership handoff: it is done
//! as soon as `set_action` returns. A blocking dispatch stays busy until the
//! handed-over action leaves its subsystem's slot, and cancelling it also
//! cancels that action.

use tracing::debug;

use crate::action::{Action, ActionContext, ActionCore, ActionId, ActionIds, BoxedAction};
use crate::error::{ActionError, Rejection};
use crate::subsystem::SubsystemId;

/// Builds the action to hand over on every start.
pub type ActionFactory = Box<dyn FnMut() -> BoxedAction>;

enum Source {
    /// Handed over on the first start only.
    Once(Option<BoxedAction>),
    /// A fresh action per start, so the dispatch can be restarted.
    Factory(ActionFactory),
}

pub struct DispatchAction {
    core: ActionCore,
    source: Source,
    blocking: bool,
    parent_busy_ok: bool,
    dispatched: Option<ActionId>,
    rejection: Option<Rejection>,
}

impl DispatchAction {
    /// Dispatch `action` to the subsystem it is bound to.
    pub fn new(ids: &ActionIds, action: BoxedAction) -> Self {
        let target = action.subsystem();
        Self::with_source(ids, target, Source::Once(Some(action)))
    }

    /// Dispatch a newly built action to `target` on every start.
    ///
    /// A start fails with [`ActionError::WrongSubsystem`] if the factory
    /// builds an action bound to any other subsystem.
    pub fn repeating(
        ids: &ActionIds,
        target: SubsystemId,
        factory: impl FnMut() -> BoxedAction + 'static,
    ) -> Self {
        Self::with_source(ids, target, Source::Factory(Box::new(factory)))
    }

    fn with_source(ids: &ActionIds, target: SubsystemId, source: Source) -> Self {
        Self {
            core: ActionCore::new(ids, target, "Dispatch"),
            source,
            blocking: false,
            parent_busy_ok: true,
            dispatched: None,
            rejection: None,
        }
    }

    /// Wait for the dispatched action to finish.
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Whether a busy ancestor of the target may be overridden (default `true`).
    pub fn parent_busy_ok(mut self, ok: bool) -> Self {
        self.parent_busy_ok = ok;
        self
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.core.rename(name);
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Id of the action handed over by the last start, if it was accepted.
    pub fn dispatched(&self) -> Option<ActionId> {
        self.dispatched
    }

    /// Why the last start was refused, if it was.
    pub fn rejection(&self) -> Option<Rejection> {
        self.rejection
    }

    fn take_action(&mut self) -> Result<BoxedAction, ActionError> {
        match &mut self.source {
            Source::Once(slot) => slot.take().ok_or_else(|| {
                ActionError::Failed(format!("'{}' already handed over its action", self.core.name()))
            }),
            Source::Factory(make) => Ok(make()),
        }
    }
}

impl Action for DispatchAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        self.dispatched = None;
        self.rejection = None;

        let action = self.take_action()?;
        let target = self.subsystem();
        if action.subsystem() != target {
            return Err(ActionError::WrongSubsystem {
                expected: target,
                actual: action.subsystem(),
            });
        }
        let action_id = action.id();

        match ctx.tree.set_action(target, action, self.parent_busy_ok, ctx.clock) {
            Ok(()) => {
                self.dispatched = Some(action_id);
                if !self.blocking || !ctx.tree.is_action_active(target, action_id) {
                    self.core.set_done();
                }
            }
            Err(rejection) => {
                debug!(
                    action = self.name(),
                    target = %target,
                    error = %rejection,
                    "dispatch refused"
                );
                self.rejection = Some(rejection);
                self.core.set_done();
            }
        }
        Ok(())
    }

    fn on_run(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let target = self.subsystem();
        let active = self
            .dispatched
            .is_some_and(|id| ctx.tree.is_action_active(target, id));
        if !active {
            self.core.set_done();
        }
        Ok(())
    }

    fn on_cancel(&mut self, ctx: &mut ActionContext<'_>) {
        if !self.blocking {
            return;
        }
        if let Some(id) = self.dispatched {
            ctx.tree.cancel_if_current(self.subsystem(), id, ctx.clock);
        }
    }
}
