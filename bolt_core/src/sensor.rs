//! Boolean sensor sampling with previous-tick edge detection.

/// What a wait state is looking for on a boolean sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCondition {
    /// Sensor currently reads false.
    IsLow,
    /// Sensor currently reads true.
    IsHigh,
    /// False on the previous tick, true on this one.
    Rising,
    /// True on the previous tick, false on this one.
    Falling,
}

/// One boolean sensor: this tick's value and the previous tick's value.
///
/// Updated exactly once per tick from `compute_state`, so edge conditions
/// hold for the whole tick regardless of how many interpreter states look
/// at them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSample {
    pub current: bool,
    pub previous: bool,
}

impl SensorSample {
    /// Sample seeded with `value` on both ticks (no edge on the first read).
    pub const fn steady(value: bool) -> Self {
        Self {
            current: value,
            previous: value,
        }
    }

    /// Shift the current value into `previous` and store the new reading.
    #[inline]
    pub fn sample(&mut self, value: bool) {
        self.previous = self.current;
        self.current = value;
    }

    pub const fn satisfies(&self, condition: SensorCondition) -> bool {
        match condition {
            SensorCondition::IsLow => !self.current,
            SensorCondition::IsHigh => self.current,
            SensorCondition::Rising => !self.previous && self.current,
            SensorCondition::Falling => self.previous && !self.current,
        }
    }
}
