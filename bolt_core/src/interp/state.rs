//! State kinds and their per-visit evaluation.

use std::time::Duration;

use tracing::warn;

use super::Machine;
use crate::clock::Clock;
use crate::sensor::SensorCondition;

/// Outcome of a `DoWork` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkResult {
    NextState,
    ActionDone,
}

/// What the interpreter does after evaluating a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Stay,
    Advance,
    Jump(usize),
    Done,
}

pub(crate) type Work<M> = Box<dyn FnMut(&mut M, &Clock) -> WorkResult>;
pub(crate) type Predicate<M> = Box<dyn Fn(&M) -> bool>;

/// Jump destination: the label as written, and its index once resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target {
    pub label: &'static str,
    pub index: usize,
}

impl Target {
    pub(crate) const fn unresolved(label: &'static str) -> Self {
        Self {
            label,
            index: usize::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Timeout {
    pub duration: Duration,
    pub target: Target,
}

pub(crate) enum StateKind<M: Machine> {
    DoWork(Work<M>),
    Branch {
        predicate: Predicate<M>,
        target: Target,
    },
    Goto(Target),
    Delay {
        duration: Duration,
        entered_at: Option<Duration>,
    },
    WaitForSensor {
        sensor: M::Sensor,
        condition: SensorCondition,
        timeout: Option<Timeout>,
        entered_at: Option<Duration>,
    },
    Assert {
        predicate: Predicate<M>,
        message: &'static str,
    },
}

pub(crate) struct State<M: Machine> {
    pub kind: StateKind<M>,
}

impl<M: Machine> State<M> {
    pub(crate) fn new(kind: StateKind<M>) -> Self {
        Self { kind }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self.kind {
            StateKind::DoWork(_) => "do_work",
            StateKind::Branch { .. } => "branch",
            StateKind::Goto(_) => "goto",
            StateKind::Delay { .. } => "delay",
            StateKind::WaitForSensor { .. } => "wait_for_sensor",
            StateKind::Assert { .. } => "assert",
        }
    }

    /// The label this state may jump to, if any.
    pub(crate) fn target_mut(&mut self) -> Option<&mut Target> {
        match &mut self.kind {
            StateKind::Branch { target, .. } | StateKind::Goto(target) => Some(target),
            StateKind::WaitForSensor {
                timeout: Some(timeout),
                ..
            } => Some(&mut timeout.target),
            _ => None,
        }
    }

    /// Forget timers left over from an earlier run.
    pub(crate) fn reset(&mut self) {
        match &mut self.kind {
            StateKind::Delay { entered_at, .. } | StateKind::WaitForSensor { entered_at, .. } => {
                *entered_at = None;
            }
            _ => {}
        }
    }

    pub(crate) fn evaluate(&mut self, mech: &mut M, clock: &Clock, program: &'static str, index: usize) -> Step {
        match &mut self.kind {
            StateKind::DoWork(work) => match work(mech, clock) {
                WorkResult::NextState => Step::Advance,
                WorkResult::ActionDone => Step::Done,
            },

            StateKind::Branch { predicate, target } => {
                if predicate(&*mech) {
                    Step::Jump(target.index)
                } else {
                    Step::Advance
                }
            }

            StateKind::Goto(target) => Step::Jump(target.index),

            StateKind::Delay {
                duration,
                entered_at,
            } => {
                let since = *entered_at.get_or_insert(clock.now());
                if clock.elapsed_since(since) > *duration {
                    *entered_at = None;
                    Step::Advance
                } else {
                    Step::Stay
                }
            }

            StateKind::WaitForSensor {
                sensor,
                condition,
                timeout,
                entered_at,
            } => {
                let since = *entered_at.get_or_insert(clock.now());
                if mech.sensor(*sensor).satisfies(*condition) {
                    *entered_at = None;
                    return Step::Advance;
                }
                match timeout {
                    Some(t) if clock.elapsed_since(since) > t.duration => {
                        *entered_at = None;
                        Step::Jump(t.target.index)
                    }
                    _ => Step::Stay,
                }
            }

            StateKind::Assert { predicate, message } => {
                if !predicate(&*mech) {
                    warn!(program, state = index, message = *message, "assertion failed");
                }
                Step::Advance
            }
        }
    }
}
