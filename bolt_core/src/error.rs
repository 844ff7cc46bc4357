//! Error taxonomy for the scheduler core.
//!
//! - **Construction errors** ([`ProgramError`], [`TreeError`], [`BootError`])
//!   are raised while building the robot at boot and abort startup.
//! - **Runtime action errors** ([`ActionError`]) are caught at the subsystem
//!   boundary, logged, and turn the failing action inert.
//! - **Arbitration rejections** ([`Rejection`]) are the expected, recoverable
//!   "no" from `set_action` and are handed back to the caller.
//! - **Interpreter dead ends** are logged by the interpreter and finish the
//!   action; they have no error type because nothing upstream can act on them.

use thiserror::Error;

use crate::subsystem::SubsystemId;

/// Failure inside an action's `start()` or `run()`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    /// The action targets a subsystem that is not in the tree.
    #[error("unknown subsystem {0}")]
    UnknownSubsystem(SubsystemId),

    /// The subsystem's mechanism is not the type the action drives.
    #[error("subsystem {subsystem} has no {expected} mechanism")]
    MechanismMismatch {
        subsystem: SubsystemId,
        expected: &'static str,
    },

    /// A dispatch was handed an action bound to a different subsystem.
    #[error("dispatch to {expected} got an action for {actual}")]
    WrongSubsystem {
        expected: SubsystemId,
        actual: SubsystemId,
    },

    /// An action group was modified after it had been started.
    #[error("action group '{0}' modified after start")]
    GroupStarted(&'static str),

    /// An action could not be built from its program.
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// A hardware collaborator reported a failure.
    #[error("hardware fault: {0}")]
    Hardware(String),

    /// Any other action-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Why `set_action` refused to install an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The action is the subsystem's own default action.
    #[error("action is the subsystem's default action")]
    DefaultAction,

    /// An ancestor is mid-maneuver and the caller did not allow overriding it.
    #[error("ancestor {ancestor} is busy")]
    AncestorBusy { ancestor: SubsystemId },

    /// The slot (or a descendant slot the call would cancel) belongs to an
    /// action that is executing right now further up the call stack.
    #[error("subsystem {0} is executing its action")]
    Executing(SubsystemId),

    /// No such subsystem.
    #[error("unknown subsystem {0}")]
    UnknownSubsystem(SubsystemId),
}

/// Malformed state-machine program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("program '{0}' has no states")]
    Empty(&'static str),

    #[error("program '{program}' declares label '{label}' twice")]
    DuplicateLabel {
        program: &'static str,
        label: &'static str,
    },

    #[error("program '{program}' state {state} targets unknown label '{label}'")]
    UnknownLabel {
        program: &'static str,
        state: usize,
        label: &'static str,
    },

    #[error("program '{program}' ends with label '{label}' that marks no state")]
    DanglingLabel {
        program: &'static str,
        label: &'static str,
    },
}

/// Failure while building the subsystem arena.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unknown subsystem {0}")]
    UnknownSubsystem(SubsystemId),

    #[error("subsystem {0} already has the maximum number of children")]
    TooManyChildren(SubsystemId),

    #[error("subsystem name '{0}' is too long")]
    NameTooLong(String),

    #[error("robot tree is full")]
    TooManySubsystems,
}

/// Failure while assembling the robot at boot. Always fatal.
#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error("cannot install default action: {0}")]
    Default(#[from] Rejection),
}
