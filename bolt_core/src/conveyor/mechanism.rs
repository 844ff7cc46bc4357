//! Conveyor mechanism state and motor outputs.

use std::any::Any;

use bitflags::bitflags;

use super::io::ConveyorIo;
use crate::clock::Clock;
use crate::interp::Machine;
use crate::sensor::SensorSample;
use crate::subsystem::Mechanism;

bitflags! {
    /// Conveyor status flags set and cleared by the programs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConveyorFlags: u8 {
        /// A ball sits at the exit, ready for the next intake cycle.
        const STAGED_FOR_COLLECT = 0x01;
        /// A ball sits at the exit, ready to be fired.
        const STAGED_FOR_FIRE    = 0x02;
        /// The receive program is running the intake.
        const COLLECTING         = 0x04;
        /// A sensor wait timed out; cleared by the operator.
        const JAMMED             = 0x08;
    }
}

/// Sensors a conveyor program can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConveyorSensor {
    Entry,
    Exit,
}

pub struct Conveyor {
    io: Box<dyn ConveyorIo>,
    capacity: u8,
    entry: SensorSample,
    exit: SensorSample,
    primed: bool,
    ball_count: u8,
    flags: ConveyorFlags,
    intake_power: f64,
    belt_power: f64,
}

impl Conveyor {
    pub fn new(io: impl ConveyorIo + 'static, capacity: u8) -> Self {
        Self {
            io: Box::new(io),
            capacity: capacity.max(1),
            entry: SensorSample::default(),
            exit: SensorSample::default(),
            primed: false,
            ball_count: 0,
            flags: ConveyorFlags::empty(),
            intake_power: 0.0,
            belt_power: 0.0,
        }
    }

    // ─── Motors ─────────────────────────────────────────────────────

    /// Command the intake roller; clamped to [-1, 1].
    pub fn set_intake_power(&mut self, power: f64) {
        self.intake_power = power.clamp(-1.0, 1.0);
        self.io.set_intake_power(self.intake_power);
    }

    /// Command the belt; clamped to [-1, 1].
    pub fn set_belt_power(&mut self, power: f64) {
        self.belt_power = power.clamp(-1.0, 1.0);
        self.io.set_belt_power(self.belt_power);
    }

    /// Zero both motors.
    pub fn stop_motors(&mut self) {
        self.set_intake_power(0.0);
        self.set_belt_power(0.0);
    }

    pub fn intake_power(&self) -> f64 {
        self.intake_power
    }

    pub fn belt_power(&self) -> f64 {
        self.belt_power
    }

    // ─── Balls ──────────────────────────────────────────────────────

    pub fn ball_count(&self) -> u8 {
        self.ball_count
    }

    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.ball_count >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.ball_count == 0
    }

    /// Count a received ball; `false` if the conveyor was already full.
    pub fn add_ball(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.ball_count += 1;
        true
    }

    /// Count a fired ball; `false` if the conveyor was already empty.
    pub fn remove_ball(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.ball_count -= 1;
        true
    }

    /// Overwrite the ball count (e.g. preloaded balls at match start).
    pub fn set_ball_count(&mut self, count: u8) {
        self.ball_count = count.min(self.capacity);
    }

    // ─── Flags ──────────────────────────────────────────────────────

    pub fn flags(&self) -> ConveyorFlags {
        self.flags
    }

    pub fn has(&self, flag: ConveyorFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flags(&mut self, flags: ConveyorFlags) {
        self.flags.insert(flags);
    }

    pub fn clear_flags(&mut self, flags: ConveyorFlags) {
        self.flags.remove(flags);
    }

    pub fn entry(&self) -> SensorSample {
        self.entry
    }

    pub fn exit(&self) -> SensorSample {
        self.exit
    }
}

impl Mechanism for Conveyor {
    fn compute_state(&mut self, _clock: &Clock) {
        let entry = self.io.entry_sensor();
        let exit = self.io.exit_sensor();
        if self.primed {
            self.entry.sample(entry);
            self.exit.sample(exit);
        } else {
            // No edge on the very first read.
            self.entry = SensorSample::steady(entry);
            self.exit = SensorSample::steady(exit);
            self.primed = true;
        }
    }

    fn stop(&mut self) {
        self.stop_motors();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Machine for Conveyor {
    type Sensor = ConveyorSensor;

    fn sensor(&self, sensor: ConveyorSensor) -> SensorSample {
        match sensor {
            ConveyorSensor::Entry => self.entry,
            ConveyorSensor::Exit => self.exit,
        }
    }
}
