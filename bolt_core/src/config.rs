//! Robot configuration (`config/bolt.toml`).
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Load with [`ConfigLoader`] and call
//! [`BoltConfig::validate`] before using the result.
//!
//! ```toml
//! [shared]
//! service_name = "practice-bot"
//! log_level = "debug"
//!
//! [cycle]
//! period_ms = 20
//!
//! [conveyor]
//! belt_power = 0.6
//! sensor_timeout_ms = 1500
//! ```

use std::path::Path;
use std::time::Duration;

use bolt_common::config::{ConfigError, ConfigLoader, SharedConfig};
use bolt_common::consts::{DEFAULT_PERIOD_MS, MAX_PERIOD_MS};
use serde::{Deserialize, Serialize};

// ─── Defaults ───────────────────────────────────────────────────────

fn default_period_ms() -> u32 {
    DEFAULT_PERIOD_MS
}

fn default_cpu_core() -> usize {
    1
}

fn default_rt_priority() -> i32 {
    80
}

fn default_intake_power() -> f64 {
    0.8
}

fn default_belt_power() -> f64 {
    0.6
}

fn default_fire_power() -> f64 {
    1.0
}

fn default_sensor_timeout_ms() -> u64 {
    1500
}

fn default_fire_delay_ms() -> u64 {
    150
}

fn default_fire_ramp_ms() -> u64 {
    200
}

fn default_capacity() -> u8 {
    5
}

// ─── Sections ───────────────────────────────────────────────────────

/// Host loop timing and RT placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Tick period in milliseconds.
    #[serde(default = "default_period_ms")]
    pub period_ms: u32,

    /// CPU core the loop is pinned to (`rt` feature only).
    #[serde(default = "default_cpu_core")]
    pub cpu_core: usize,

    /// SCHED_FIFO priority (`rt` feature only).
    #[serde(default = "default_rt_priority")]
    pub rt_priority: i32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            cpu_core: default_cpu_core(),
            rt_priority: default_rt_priority(),
        }
    }
}

impl CycleConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(u64::from(self.period_ms))
    }
}

/// Conveyor motor powers, timeouts and capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConveyorConfig {
    #[serde(default = "default_intake_power")]
    pub intake_power: f64,

    #[serde(default = "default_belt_power")]
    pub belt_power: f64,

    /// Belt power reached at the end of the fire ramp.
    #[serde(default = "default_fire_power")]
    pub fire_power: f64,

    /// Bound on every sensor wait that can jam.
    #[serde(default = "default_sensor_timeout_ms")]
    pub sensor_timeout_ms: u64,

    /// Pause between two fired balls.
    #[serde(default = "default_fire_delay_ms")]
    pub fire_delay_ms: u64,

    /// Time for the belt to ramp up to `fire_power` while feeding.
    #[serde(default = "default_fire_ramp_ms")]
    pub fire_ramp_ms: u64,

    /// Balls the conveyor holds.
    #[serde(default = "default_capacity")]
    pub capacity: u8,
}

impl Default for ConveyorConfig {
    fn default() -> Self {
        Self {
            intake_power: default_intake_power(),
            belt_power: default_belt_power(),
            fire_power: default_fire_power(),
            sensor_timeout_ms: default_sensor_timeout_ms(),
            fire_delay_ms: default_fire_delay_ms(),
            fire_ramp_ms: default_fire_ramp_ms(),
            capacity: default_capacity(),
        }
    }
}

impl ConveyorConfig {
    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    pub fn fire_delay(&self) -> Duration {
        Duration::from_millis(self.fire_delay_ms)
    }

    pub fn fire_ramp(&self) -> Duration {
        Duration::from_millis(self.fire_ramp_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, power) in [
            ("intake_power", self.intake_power),
            ("belt_power", self.belt_power),
            ("fire_power", self.fire_power),
        ] {
            if !(-1.0..=1.0).contains(&power) {
                return Err(ConfigError::ValidationError(format!(
                    "conveyor.{name} must be within [-1, 1], got {power}"
                )));
            }
        }
        if self.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "conveyor.capacity must be at least 1".to_string(),
            ));
        }
        if self.sensor_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "conveyor.sensor_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Top Level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoltConfig {
    #[serde(default)]
    pub shared: SharedConfig,

    #[serde(default)]
    pub cycle: CycleConfig,

    #[serde(default)]
    pub conveyor: ConveyorConfig,
}

impl BoltConfig {
    /// Load from `path` and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config = Self::load_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// # Validation Rules
    /// 1. `shared.service_name` is not blank
    /// 2. `0 < cycle.period_ms <= MAX_PERIOD_MS`
    /// 3. every conveyor power within [-1, 1]
    /// 4. `conveyor.capacity >= 1`, `conveyor.sensor_timeout_ms > 0`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if self.cycle.period_ms == 0 || self.cycle.period_ms > MAX_PERIOD_MS {
            return Err(ConfigError::ValidationError(format!(
                "cycle.period_ms must be within 1..={MAX_PERIOD_MS}, got {}",
                self.cycle.period_ms
            )));
        }
        self.conveyor.validate()
    }
}
