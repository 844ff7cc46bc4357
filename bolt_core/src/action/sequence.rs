//! Run child actions one after another.

use crate::action::{Action, ActionContext, ActionCore, ActionIds, BoxedAction};
use crate::error::ActionError;
use crate::subsystem::SubsystemId;

/// Children in order; done when the last child is done.
///
/// Children that finish during their own `start()` are skipped within the
/// same call, so a run of instant children completes in one tick. A child
/// started while advancing is first run on the next `run()`.
pub struct SequenceAction {
    core: ActionCore,
    children: Vec<BoxedAction>,
    index: usize,
    started: bool,
}

impl SequenceAction {
    pub fn new(ids: &ActionIds, subsystem: SubsystemId, children: Vec<BoxedAction>) -> Self {
        Self {
            core: ActionCore::new(ids, subsystem, "Sequence"),
            children,
            index: 0,
            started: false,
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.core.rename(name);
        self
    }

    /// Append a child. Not allowed once the sequence has been started.
    pub fn push(&mut self, child: BoxedAction) -> Result<(), ActionError> {
        if self.started {
            return Err(ActionError::GroupStarted(self.name()));
        }
        self.children.push(child);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Index of the child currently running (`len()` once finished).
    pub fn current_index(&self) -> usize {
        self.index
    }

    fn advance(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        while let Some(child) = self.children.get(self.index) {
            if !child.is_done() {
                return Ok(());
            }
            self.index += 1;
            if let Some(next) = self.children.get_mut(self.index) {
                next.start(ctx)?;
            }
        }
        self.core.set_done();
        Ok(())
    }
}

impl Action for SequenceAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        self.started = true;
        self.index = 0;
        match self.children.first_mut() {
            Some(first) => first.start(ctx)?,
            None => {
                self.core.set_done();
                return Ok(());
            }
        }
        self.advance(ctx)
    }

    fn on_run(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        if let Some(child) = self.children.get_mut(self.index) {
            child.run(ctx)?;
        }
        self.advance(ctx)
    }

    fn on_cancel(&mut self, ctx: &mut ActionContext<'_>) {
        if let Some(child) = self.children.get_mut(self.index) {
            child.cancel(ctx);
        }
    }
}
