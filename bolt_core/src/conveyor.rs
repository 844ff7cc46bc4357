//! Ball conveyor: an intake roller feeding a belt past two beam-break
//! sensors.
//!
//! ```text
//!   intake ──► [entry sensor] ══ belt ══ [exit sensor] ──► shooter
//! ```
//!
//! The mechanism ([`Conveyor`]) samples both sensors once per tick and owns
//! the motor outputs. The behaviour lives in four state-machine programs
//! ([`programs`]) built once at boot and interpreted by
//! [`crate::interp::StateMachineAction`].

pub mod io;
pub mod mechanism;
pub mod programs;

pub use io::{ConveyorIo, ScriptedIo};
pub use mechanism::{Conveyor, ConveyorFlags, ConveyorSensor};
pub use programs::{ConveyorActions, ConveyorHooks, ConveyorStateAction};
