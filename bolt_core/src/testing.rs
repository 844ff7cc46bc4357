//! Unit-test doubles shared across modules.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::action::{Action, ActionContext, ActionCore, ActionIds, BoxedAction};
use crate::clock::Clock;
use crate::error::ActionError;
use crate::subsystem::{Mechanism, SubsystemId};

/// Ordered record of lifecycle events (`start:name`, `run:name`, ...).
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub(crate) fn push(&self, event: String) {
        self.0.borrow_mut().push(event);
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Scriptable action that records every lifecycle call.
pub(crate) struct Stub {
    core: ActionCore,
    log: EventLog,
    finish_after: Option<u32>,
    runs: u32,
    fail_start: bool,
    fail_run_at: Option<u32>,
    hijack: Option<(SubsystemId, BoxedAction)>,
}

impl Stub {
    /// Never finishes on its own.
    pub(crate) fn endless(ids: &ActionIds, subsystem: SubsystemId, name: &'static str, log: &EventLog) -> Self {
        Self {
            core: ActionCore::new(ids, subsystem, name),
            log: log.clone(),
            finish_after: None,
            runs: 0,
            fail_start: false,
            fail_run_at: None,
            hijack: None,
        }
    }

    /// Done after `runs` calls to `run()`; `0` means done at start.
    pub(crate) fn finishing(
        ids: &ActionIds,
        subsystem: SubsystemId,
        name: &'static str,
        runs: u32,
        log: &EventLog,
    ) -> Self {
        Self {
            finish_after: Some(runs),
            ..Self::endless(ids, subsystem, name, log)
        }
    }

    pub(crate) fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub(crate) fn fail_run_at(mut self, run: u32) -> Self {
        self.fail_run_at = Some(run);
        self
    }

    /// On the first run, try to install `action` on `target`.
    pub(crate) fn on_run_set_action(mut self, target: SubsystemId, action: BoxedAction) -> Self {
        self.hijack = Some((target, action));
        self
    }

    /// A second stub sharing this one's identity.
    pub(crate) fn twin(&self) -> Self {
        Self {
            core: self.core.clone(),
            log: self.log.clone(),
            finish_after: self.finish_after,
            runs: 0,
            fail_start: false,
            fail_run_at: None,
            hijack: None,
        }
    }
}

impl Action for Stub {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn on_start(&mut self, _ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        self.log.push(format!("start:{}", self.name()));
        self.runs = 0;
        if self.fail_start {
            return Err(ActionError::Failed("stub start".into()));
        }
        if self.finish_after == Some(0) {
            self.core.set_done();
        }
        Ok(())
    }

    fn on_run(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        self.log.push(format!("run:{}", self.name()));
        self.runs += 1;
        if let Some((target, action)) = self.hijack.take() {
            if let Err(rejection) = ctx.tree.set_action(target, action, true, ctx.clock) {
                self.log.push(format!("rejected:{rejection}"));
            }
        }
        if self.fail_run_at == Some(self.runs) {
            return Err(ActionError::Failed("stub run".into()));
        }
        if self.finish_after.is_some_and(|n| self.runs >= n) {
            self.core.set_done();
        }
        Ok(())
    }

    fn on_cancel(&mut self, _ctx: &mut ActionContext<'_>) {
        self.log.push(format!("cancel:{}", self.name()));
    }
}

/// Mechanism that counts samples and holds one output.
#[derive(Debug, Default)]
pub(crate) struct StubMechanism {
    pub samples: u32,
    pub output: f64,
}

impl Mechanism for StubMechanism {
    fn compute_state(&mut self, _clock: &Clock) {
        self.samples += 1;
    }

    fn stop(&mut self) {
        self.output = 0.0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Single-switch machine for interpreter tests.
#[derive(Debug, Default)]
pub(crate) struct Lamp {
    pub on: bool,
    pub switch: crate::sensor::SensorSample,
    pub raw_switch: bool,
    pub stops: u32,
}

impl Mechanism for Lamp {
    fn compute_state(&mut self, _clock: &Clock) {
        self.switch.sample(self.raw_switch);
    }

    fn stop(&mut self) {
        self.on = false;
        self.stops += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl crate::interp::Machine for Lamp {
    type Sensor = ();

    fn sensor(&self, _sensor: ()) -> crate::sensor::SensorSample {
        self.switch
    }
}
