//! Subsystem tree root.
//!
//! A subsystem is a node in the robot's mechanism tree. It owns the hardware
//! collaborator for its mechanism, at most one running action and an
//! optional default action. The nodes live in an arena ([`tree::SubsystemTree`])
//! addressed by [`SubsystemId`] handles; a child refers to its parent by
//! handle only.

pub mod tree;

use std::any::Any;
use std::fmt;

use crate::clock::Clock;

/// Stable handle of a subsystem inside its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubsystemId(u16);

impl SubsystemId {
    /// The root subsystem (the robot itself).
    pub const ROOT: Self = Self(0);

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u16)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hardware side of a subsystem.
///
/// `compute_state` samples inputs once per tick before any action runs;
/// `stop` must leave every actuator at zero output before it returns.
pub trait Mechanism: Any {
    fn compute_state(&mut self, _clock: &Clock) {}

    fn stop(&mut self) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Mechanism for grouping nodes that own no hardware (e.g. the robot root).
#[derive(Debug, Clone, Copy, Default)]
pub struct Passive;

impl Mechanism for Passive {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
