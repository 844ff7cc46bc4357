//! Externally supplied time source.
//!
//! The host loop is the only writer: it calls [`Clock::update`] once per tick
//! before anything else runs. Actions and interpreter states read `now` and
//! `dt` and never consult a wall clock or sleep.

use std::time::Duration;

/// Current tick time and the delta since the previous tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    now: Duration,
    dt: Duration,
}

impl Clock {
    /// Clock at time zero.
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
            dt: Duration::ZERO,
        }
    }

    /// Clock positioned at `now` with no elapsed delta.
    pub const fn at(now: Duration) -> Self {
        Self {
            now,
            dt: Duration::ZERO,
        }
    }

    /// Record the host's time for a new tick.
    ///
    /// Time never runs backwards: an earlier `now` leaves the clock where it
    /// is with a zero delta.
    pub fn update(&mut self, now: Duration) {
        self.dt = now.saturating_sub(self.now);
        if now > self.now {
            self.now = now;
        }
    }

    /// Advance by a fixed delta (simulation and tests).
    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
        self.dt = dt;
    }

    #[inline]
    pub const fn now(&self) -> Duration {
        self.now
    }

    #[inline]
    pub const fn dt(&self) -> Duration {
        self.dt
    }

    /// Time elapsed since `earlier`, zero if `earlier` lies in the future.
    #[inline]
    pub fn elapsed_since(&self, earlier: Duration) -> Duration {
        self.now.saturating_sub(earlier)
    }
}
