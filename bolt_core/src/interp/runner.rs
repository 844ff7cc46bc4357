//! The action that interprets a [`Program`].

use std::time::Duration;

use bolt_common::consts::MAX_STEPS_PER_TICK;
use tracing::{debug, debug_span, error, trace, warn};

use super::Machine;
use super::program::Program;
use super::state::Step;
use crate::action::{Action, ActionContext, ActionCore, ActionIds};
use crate::clock::Clock;
use crate::error::ActionError;
use crate::subsystem::SubsystemId;

/// Where the interpreter is parked at the end of a `run()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateView {
    pub index: usize,
    pub label: Option<&'static str>,
    /// Clock time at which this state was entered.
    pub entered_at: Duration,
}

/// Mechanism-specific continuous effects, applied alongside the discrete
/// state transitions.
pub trait ProgramHooks<M> {
    fn on_started(&mut self, _mech: &mut M, _clock: &Clock) {}

    /// Called after every `run()` that leaves the program unfinished.
    fn on_running(&mut self, _mech: &mut M, _state: StateView, _clock: &Clock) {}

    fn on_finished(&mut self, _mech: &mut M, _clock: &Clock) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<M> ProgramHooks<M> for NoHooks {}

pub struct StateMachineAction<M: Machine, H: ProgramHooks<M> = NoHooks> {
    core: ActionCore,
    program: Program<M>,
    hooks: H,
    pc: usize,
    entered_at: Duration,
}

impl<M: Machine> StateMachineAction<M, NoHooks> {
    pub fn new(ids: &ActionIds, subsystem: SubsystemId, program: Program<M>) -> Self {
        Self::with_hooks(ids, subsystem, program, NoHooks)
    }
}

impl<M: Machine, H: ProgramHooks<M>> StateMachineAction<M, H> {
    pub fn with_hooks(ids: &ActionIds, subsystem: SubsystemId, program: Program<M>, hooks: H) -> Self {
        Self {
            core: ActionCore::new(ids, subsystem, program.name()),
            program,
            hooks,
            pc: 0,
            entered_at: Duration::ZERO,
        }
    }

    /// Index of the current state; equals the program length once finished.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn current_label(&self) -> Option<&'static str> {
        self.program.label_of(self.pc)
    }

    pub fn program(&self) -> &Program<M> {
        &self.program
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    fn enter(&mut self, index: usize, clock: &Clock) {
        trace!(
            program = self.program.name(),
            from = self.pc,
            to = index,
            kind = self.program.kind_of(index).unwrap_or("?"),
            "state entered"
        );
        self.pc = index;
        self.entered_at = clock.now();
    }

    fn finish(&mut self, mech: &mut M, clock: &Clock) {
        self.pc = self.program.len();
        self.core.set_done();
        self.hooks.on_finished(mech, clock);
    }

    /// Evaluate states until one stays, the program ends, or the step
    /// budget for this tick is spent.
    ///
    /// The budget covers one pass over every state plus
    /// `MAX_STEPS_PER_TICK`, so only a program that loops without staying
    /// can run out of it.
    fn step(&mut self, mech: &mut M, clock: &Clock) {
        let name = self.program.name();
        let len = self.program.len();

        for _ in 0..len + MAX_STEPS_PER_TICK {
            let pc = self.pc;
            let Some(state) = self.program.state_mut(pc) else {
                error!(program = name, state = pc, "program counter out of range");
                self.finish(mech, clock);
                return;
            };

            match state.evaluate(mech, clock, name, pc) {
                Step::Stay => return,
                Step::Advance if pc + 1 >= len => {
                    debug!(program = name, state = pc, "ran past the last state");
                    self.finish(mech, clock);
                    return;
                }
                Step::Advance => self.enter(pc + 1, clock),
                Step::Jump(target) if target >= len => {
                    error!(program = name, state = pc, target, "jump target not found");
                    self.finish(mech, clock);
                    return;
                }
                Step::Jump(target) => {
                    debug!(
                        program = name,
                        from = self.program.label_of(pc).unwrap_or("-"),
                        to = self.program.label_of(target).unwrap_or("-"),
                        "jump"
                    );
                    self.enter(target, clock);
                }
                Step::Done => {
                    debug!(program = name, state = pc, "program finished");
                    self.finish(mech, clock);
                    return;
                }
            }
        }

        warn!(
            program = name,
            state = self.pc,
            label = self.current_label().unwrap_or("-"),
            "step budget spent, resuming next tick"
        );
    }
}

impl<M: Machine, H: ProgramHooks<M>> Action for StateMachineAction<M, H> {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let mech = ctx.tree.mechanism_mut::<M>(self.subsystem())?;
        self.program.reset();
        self.pc = 0;
        self.entered_at = ctx.clock.now();
        self.hooks.on_started(mech, ctx.clock);
        Ok(())
    }

    fn on_run(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let clock = ctx.clock;
        let mech = ctx.tree.mechanism_mut::<M>(self.subsystem())?;

        let span = debug_span!("program", name = self.program.name());
        let _enter = span.enter();

        self.step(mech, clock);
        if !self.is_done() {
            let view = StateView {
                index: self.pc,
                label: self.current_label(),
                entered_at: self.entered_at,
            };
            self.hooks.on_running(mech, view, clock);
        }
        Ok(())
    }

    fn on_cancel(&mut self, ctx: &mut ActionContext<'_>) {
        match ctx.tree.mechanism_mut::<M>(self.subsystem()) {
            Ok(mech) => mech.stop(),
            Err(err) => warn!(program = self.program.name(), error = %err, "cannot stop mechanism"),
        }
    }
}
