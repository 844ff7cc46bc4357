//! Prelude module for common re-exports.
//!
//! ```rust
//! use bolt_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_PERIOD_MS, MAX_CHILDREN, MAX_STEPS_PER_TICK, MAX_SUBSYSTEMS};

/// Default host tick period as Duration.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(DEFAULT_PERIOD_MS as u64);
