//! Program construction and label resolution.
//!
//! Labels are resolved to indices exactly once, in [`ProgramBuilder::build`].
//! A program that names a label it never declares is rejected there, so the
//! interpreter never looks a label up at tick time.

use std::collections::HashMap;
use std::time::Duration;

use super::Machine;
use super::state::{State, StateKind, Target, Timeout, WorkResult};
use crate::clock::Clock;
use crate::error::ProgramError;
use crate::sensor::SensorCondition;

/// Fluent builder for a [`Program`].
///
/// ```ignore
/// let program = ProgramBuilder::<Conveyor>::new("stage")
///     .do_work(|c, _| { c.set_belt_power(0.6); WorkResult::NextState })
///     .wait_for_or_timeout(ConveyorSensor::Exit, SensorCondition::IsHigh, timeout, "jam")
///     .do_work(|c, _| { c.stop_motors(); WorkResult::ActionDone })
///     .label("jam")
///     .do_work(|c, _| { c.mark_jammed(); WorkResult::ActionDone })
///     .build()?;
/// ```
pub struct ProgramBuilder<M: Machine> {
    name: &'static str,
    states: Vec<State<M>>,
    labels: Vec<(&'static str, usize)>,
    pending: Vec<&'static str>,
}

impl<M: Machine> ProgramBuilder<M> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            states: Vec::new(),
            labels: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Name the next state added.
    pub fn label(mut self, label: &'static str) -> Self {
        self.pending.push(label);
        self
    }

    pub fn do_work(self, work: impl FnMut(&mut M, &Clock) -> WorkResult + 'static) -> Self {
        self.push(StateKind::DoWork(Box::new(work)))
    }

    /// Jump to `target` when `predicate` holds, otherwise fall through.
    pub fn branch(self, target: &'static str, predicate: impl Fn(&M) -> bool + 'static) -> Self {
        self.push(StateKind::Branch {
            predicate: Box::new(predicate),
            target: Target::unresolved(target),
        })
    }

    pub fn goto(self, target: &'static str) -> Self {
        self.push(StateKind::Goto(Target::unresolved(target)))
    }

    pub fn delay(self, duration: Duration) -> Self {
        self.push(StateKind::Delay {
            duration,
            entered_at: None,
        })
    }

    /// Wait, without bound, until `sensor` satisfies `condition`.
    pub fn wait_for(self, sensor: M::Sensor, condition: SensorCondition) -> Self {
        self.push(StateKind::WaitForSensor {
            sensor,
            condition,
            timeout: None,
            entered_at: None,
        })
    }

    /// Wait until `sensor` satisfies `condition`, jumping to `target` once
    /// strictly more than `timeout` has passed.
    pub fn wait_for_or_timeout(
        self,
        sensor: M::Sensor,
        condition: SensorCondition,
        timeout: Duration,
        target: &'static str,
    ) -> Self {
        self.push(StateKind::WaitForSensor {
            sensor,
            condition,
            timeout: Some(Timeout {
                duration: timeout,
                target: Target::unresolved(target),
            }),
            entered_at: None,
        })
    }

    /// Log `message` when `predicate` does not hold; never stops the program.
    pub fn assert(self, message: &'static str, predicate: impl Fn(&M) -> bool + 'static) -> Self {
        self.push(StateKind::Assert {
            predicate: Box::new(predicate),
            message,
        })
    }

    fn push(mut self, kind: StateKind<M>) -> Self {
        let index = self.states.len();
        self.labels
            .extend(self.pending.drain(..).map(|label| (label, index)));
        self.states.push(State::new(kind));
        self
    }

    /// Validate the program and resolve every jump target.
    pub fn build(self) -> Result<Program<M>, ProgramError> {
        let Self {
            name,
            mut states,
            labels,
            pending,
        } = self;

        if states.is_empty() {
            return Err(ProgramError::Empty(name));
        }
        if let Some(&label) = pending.first() {
            return Err(ProgramError::DanglingLabel {
                program: name,
                label,
            });
        }

        let mut index = HashMap::with_capacity(labels.len());
        for &(label, at) in &labels {
            if index.insert(label, at).is_some() {
                return Err(ProgramError::DuplicateLabel {
                    program: name,
                    label,
                });
            }
        }

        for (at, state) in states.iter_mut().enumerate() {
            if let Some(target) = state.target_mut() {
                target.index = *index.get(target.label).ok_or(ProgramError::UnknownLabel {
                    program: name,
                    state: at,
                    label: target.label,
                })?;
            }
        }

        Ok(Program {
            name,
            states,
            labels,
        })
    }
}

/// A validated, immutable table of states.
pub struct Program<M: Machine> {
    name: &'static str,
    states: Vec<State<M>>,
    labels: Vec<(&'static str, usize)>,
}

impl<M: Machine> Program<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// First label attached to the state at `index`.
    pub fn label_of(&self, index: usize) -> Option<&'static str> {
        self.labels
            .iter()
            .find(|(_, at)| *at == index)
            .map(|(label, _)| *label)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, at)| *at)
    }

    /// Kind of the state at `index` (`"delay"`, `"goto"`, ...).
    pub fn kind_of(&self, index: usize) -> Option<&'static str> {
        self.states.get(index).map(State::kind_name)
    }

    /// Clear per-visit timers before a fresh run.
    pub fn reset(&mut self) {
        self.states.iter_mut().for_each(State::reset);
    }

    pub(crate) fn state_mut(&mut self, index: usize) -> Option<&mut State<M>> {
        self.states.get_mut(index)
    }
}
