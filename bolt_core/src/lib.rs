//! # Bolt Core Library
//!
//! Cooperative, single-threaded action scheduler for a competition robot.
//! The host calls one tick per period; within a tick every subsystem samples
//! its sensors, the active controller issues commands, and every subsystem
//! runs its current action once.
//!
//! ## Layers
//!
//! 1. **Action**: start / run / cancel lifecycle with a sticky `done` flag
//! 2. **Combinators**: sequence, parallel, dispatch to another subsystem
//! 3. **Subsystem tree**: one slot per subsystem, default actions, busy
//!    arbitration and cascading cancel
//! 4. **Interpreter**: label-addressed state-machine programs executed as
//!    an action, with same-tick chaining
//! 5. **Conveyor**: the ball conveyor mechanism and its programs
//!
//! ## No Blocking
//!
//! Nothing below [`cycle`] sleeps or reads a wall clock. All time comes from
//! [`clock::Clock`], which the host updates once per tick.

pub mod action;
pub mod clock;
pub mod config;
pub mod conveyor;
pub mod cycle;
pub mod demo;
pub mod error;
pub mod interp;
pub mod robot;
pub mod sensor;
pub mod subsystem;

#[cfg(test)]
pub(crate) mod testing;
