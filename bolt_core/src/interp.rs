//! Table-driven state-machine interpreter.
//!
//! A [`Program`] is a flat, validated array of labelled states built once at
//! boot with [`ProgramBuilder`]. [`StateMachineAction`] interprets it inside a
//! single action's `run()`: each call evaluates states until one asks to stay,
//! so zero-duration states (branch, goto, instantaneous work) chain within the
//! same tick.
//!
//! ## Evaluation result
//!
//! | Step        | Effect                                             |
//! |-------------|----------------------------------------------------|
//! | `Stay`      | stop for this tick                                 |
//! | `Advance`   | next index; past the last state the action is done |
//! | `Jump(i)`   | index `i` (resolved from a label at build time)    |
//! | `Done`      | action done                                        |

pub mod program;
pub mod runner;
pub mod state;

use std::fmt::Debug;

use crate::sensor::SensorSample;
use crate::subsystem::Mechanism;

pub use program::{Program, ProgramBuilder};
pub use runner::{NoHooks, ProgramHooks, StateMachineAction, StateView};
pub use state::{Step, WorkResult};

/// A mechanism a program can drive.
///
/// Sensors are named by a mechanism-specific key and read from the samples
/// taken in `compute_state`, so edge conditions are stable for the tick.
pub trait Machine: Mechanism + Sized {
    type Sensor: Copy + Debug + 'static;

    fn sensor(&self, sensor: Self::Sensor) -> SensorSample;
}
