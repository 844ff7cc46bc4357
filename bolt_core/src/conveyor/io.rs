//! Hardware collaborator for the conveyor.

use std::cell::RefCell;
use std::rc::Rc;

/// Raw sensor reads and motor writes.
///
/// Writes are fire-and-forget: the implementation reports its own faults.
pub trait ConveyorIo {
    /// Beam break at the intake end; `true` while a ball blocks it.
    fn entry_sensor(&mut self) -> bool;

    /// Beam break at the shooter end.
    fn exit_sensor(&mut self) -> bool;

    fn set_intake_power(&mut self, power: f64);

    fn set_belt_power(&mut self, power: f64);
}

#[derive(Debug, Default)]
struct IoState {
    entry: bool,
    exit: bool,
    intake_power: f64,
    belt_power: f64,
}

/// In-memory I/O for simulation and tests.
///
/// Clones share the same state, so a test (or simulator) keeps one handle to
/// drive the sensors and observe the motors while the mechanism owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIo {
    state: Rc<RefCell<IoState>>,
}

impl ScriptedIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entry(&self, blocked: bool) {
        self.state.borrow_mut().entry = blocked;
    }

    pub fn set_exit(&self, blocked: bool) {
        self.state.borrow_mut().exit = blocked;
    }

    pub fn entry(&self) -> bool {
        self.state.borrow().entry
    }

    pub fn exit(&self) -> bool {
        self.state.borrow().exit
    }

    pub fn intake_power(&self) -> f64 {
        self.state.borrow().intake_power
    }

    pub fn belt_power(&self) -> f64 {
        self.state.borrow().belt_power
    }
}

impl ConveyorIo for ScriptedIo {
    fn entry_sensor(&mut self) -> bool {
        self.entry()
    }

    fn exit_sensor(&mut self) -> bool {
        self.exit()
    }

    fn set_intake_power(&mut self, power: f64) {
        self.state.borrow_mut().intake_power = power;
    }

    fn set_belt_power(&mut self, power: f64) {
        self.state.borrow_mut().belt_power = power;
    }
}
