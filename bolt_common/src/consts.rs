//! System-wide constants for the bolt workspace.
//!
//! Single source of truth for the tick period and every fixed capacity used
//! by the scheduler's pre-allocated structures.

use static_assertions::const_assert;

/// Default host tick period in milliseconds (50 Hz).
pub const DEFAULT_PERIOD_MS: u32 = 20;

/// Upper bound accepted for a configured tick period.
pub const MAX_PERIOD_MS: u32 = 1000;

/// Maximum number of subsystems in one robot tree.
pub const MAX_SUBSYSTEMS: usize = 64;

/// Maximum number of direct children per subsystem.
pub const MAX_CHILDREN: usize = 16;

/// Maximum subsystem name length in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Interpreter state evaluations allowed in one `run()` call on top of a
/// single pass over the program.
pub const MAX_STEPS_PER_TICK: usize = 64;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/bolt.toml";

const_assert!(DEFAULT_PERIOD_MS > 0 && DEFAULT_PERIOD_MS <= MAX_PERIOD_MS);
const_assert!(MAX_CHILDREN < MAX_SUBSYSTEMS);
// Subsystem handles are u16.
const_assert!(MAX_SUBSYSTEMS <= u16::MAX as usize);
const_assert!(MAX_STEPS_PER_TICK > 0);
