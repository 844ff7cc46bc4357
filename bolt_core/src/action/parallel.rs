//! Run child actions side by side.

use crate::action::{Action, ActionContext, ActionCore, ActionIds, BoxedAction};
use crate::error::ActionError;
use crate::subsystem::SubsystemId;

/// All children at once; done when every child is done.
pub struct ParallelAction {
    core: ActionCore,
    children: Vec<BoxedAction>,
    started: bool,
}

impl ParallelAction {
    pub fn new(ids: &ActionIds, subsystem: SubsystemId, children: Vec<BoxedAction>) -> Self {
        Self {
            core: ActionCore::new(ids, subsystem, "Parallel"),
            children,
            started: false,
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.core.rename(name);
        self
    }

    /// Add a child. Not allowed once the group has been started.
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

    fn finish_if_all_done(&mut self) {
        if self.children.iter().all(|c| c.is_done()) {
            self.core.set_done();
        }
    }
}

impl Action for ParallelAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        self.started = true;
        for child in &mut self.children {
            child.start(ctx)?;
        }
        self.finish_if_all_done();
        Ok(())
    }

    fn on_run(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        for child in self.children.iter_mut().filter(|c| !c.is_done()) {
            child.run(ctx)?;
        }
        self.finish_if_all_done();
        Ok(())
    }

    fn on_cancel(&mut self, ctx: &mut ActionContext<'_>) {
        for child in self.children.iter_mut().filter(|c| !c.is_done()) {
            child.cancel(ctx);
        }
    }
}
