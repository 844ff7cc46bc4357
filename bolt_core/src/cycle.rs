//! Periodic host loop: sample → control → run.
//!
//! Drives a [`Robot`] at a fixed period and measures every tick.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to one CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`: RT priority.
//!
//! Without the `rt` feature every step is a no-op.
//!
//! ## Pacing
//! - `rt`: absolute-time `clock_nanosleep` on `CLOCK_MONOTONIC`, drift-free.
//! - simulation: `Instant` + `thread::sleep` for the rest of the period.
//! - [`CycleRunner::run_fast`]: simulated time, no sleeping at all.
//!
//! An overrun is counted and logged. It never stops the loop: the tree must
//! keep getting ticks even when one of them ran long.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::robot::{Controller, Robot};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks executed.
    pub cycle_count: u64,
    /// Last tick duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum tick duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum tick duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Ticks that took longer than the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (expected vs. actual wake).
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record one tick. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        if latency_ns > self.max_latency_ns {
            self.max_latency_ns = latency_ns;
        }
    }

    /// Average tick time [ns] (0 before the first tick).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Errors raised while preparing or pacing the loop.
#[derive(Debug, Error)]
pub enum CycleError {
    /// An RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// The monotonic clock could not be read.
    #[error("clock error: {0}")]
    Clock(String),

    /// The configured period is zero.
    #[error("cycle period must be greater than zero")]
    ZeroPeriod,
}

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusively borrowed stack location.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(not(feature = "rt"))]
fn prefault_stack() {}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Perform the full RT setup sequence on the calling thread.
///
/// Must be called before [`CycleRunner::run`].
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    debug!(cpu_core, rt_priority, rt = cfg!(feature = "rt"), "RT setup done");
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the robot and the active controller and ticks them periodically.
pub struct CycleRunner {
    robot: Robot,
    controller: Box<dyn Controller>,
    period: Duration,
    period_ns: i64,
    stats: CycleStats,
    /// Robot time handed to the next tick in `run_fast`.
    sim_now: Duration,
}

impl CycleRunner {
    pub fn new(
        robot: Robot,
        controller: Box<dyn Controller>,
        period: Duration,
    ) -> Result<Self, CycleError> {
        if period.is_zero() {
            return Err(CycleError::ZeroPeriod);
        }
        let period_ns = i64::try_from(period.as_nanos()).unwrap_or(i64::MAX);
        Ok(Self {
            robot,
            controller,
            period,
            period_ns,
            stats: CycleStats::new(),
            sim_now: Duration::ZERO,
        })
    }

    #[inline]
    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    #[inline]
    pub fn robot_mut(&mut self) -> &mut Robot {
        &mut self.robot
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Swap the active controller (e.g. autonomous → teleop).
    pub fn set_controller(&mut self, controller: Box<dyn Controller>) {
        info!(
            from = self.controller.name(),
            to = controller.name(),
            "controller changed"
        );
        self.controller = controller;
    }

    /// Release the robot, e.g. for a final [`Robot::shutdown`].
    pub fn into_robot(self) -> Robot {
        self.robot
    }

    /// Run `ticks` periods back to back on simulated time.
    ///
    /// Robot time advances by exactly one period per tick regardless of how
    /// long the tick took, so results are deterministic.
    pub fn run_fast(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.sim_now += self.period;
            let started = Instant::now();
            self.robot.tick(self.sim_now, self.controller.as_mut());
            self.finish_tick(elapsed_ns(started.elapsed()), 0);
        }
    }

    /// Run exactly `ticks` paced periods.
    pub fn run_ticks(&mut self, ticks: u64) -> Result<(), CycleError> {
        self.run(Some(ticks), &AtomicBool::new(true))
    }

    /// Paced loop until `running` clears or `max_ticks` have run.
    ///
    /// Robot time is the monotonic time since the loop was entered.
    pub fn run(&mut self, max_ticks: Option<u64>, running: &AtomicBool) -> Result<(), CycleError> {
        info!(
            period_ms = self.period.as_millis() as u64,
            max_ticks,
            controller = self.controller.name(),
            "entering cycle loop"
        );

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop(max_ticks, running);

        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop(max_ticks, running);

        info!(
            ticks = self.stats.cycle_count,
            avg_us = self.stats.avg_cycle_ns() / 1000,
            max_us = self.stats.max_cycle_ns / 1000,
            overruns = self.stats.overruns,
            "cycle loop left"
        );
        result
    }

    /// RT loop using `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self, max_ticks: Option<u64>, running: &AtomicBool) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let origin = clock_gettime(clock).map_err(|e| CycleError::Clock(e.to_string()))?;
        let mut next_wake = origin;
        let mut ticks = 0u64;

        while running.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| ticks < max) {
            next_wake = timespec_add_ns(next_wake, self.period_ns);
            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);

            let tick_start = clock_gettime(clock).map_err(|e| CycleError::Clock(e.to_string()))?;
            let wake_latency_ns = timespec_diff_ns(&tick_start, &next_wake).abs();
            let now_ns = timespec_diff_ns(&tick_start, &origin).max(0);

            self.robot
                .tick(Duration::from_nanos(now_ns as u64), self.controller.as_mut());

            let tick_end = clock_gettime(clock).map_err(|e| CycleError::Clock(e.to_string()))?;
            self.finish_tick(timespec_diff_ns(&tick_end, &tick_start), wake_latency_ns);
            ticks += 1;
        }
        Ok(())
    }

    /// Simulation loop using `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self, max_ticks: Option<u64>, running: &AtomicBool) -> Result<(), CycleError> {
        let origin = Instant::now();
        let mut ticks = 0u64;

        while running.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| ticks < max) {
            let tick_start = Instant::now();
            self.robot
                .tick(tick_start.duration_since(origin), self.controller.as_mut());

            let elapsed = tick_start.elapsed();
            self.finish_tick(elapsed_ns(elapsed), 0);
            ticks += 1;

            if let Some(remaining) = self.period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }

    fn finish_tick(&mut self, duration_ns: i64, latency_ns: i64) {
        self.stats.record(duration_ns, latency_ns);
        if duration_ns > self.period_ns {
            self.stats.overruns += 1;
            warn!(
                tick = self.stats.cycle_count,
                duration_us = duration_ns / 1000,
                budget_us = self.period_ns / 1000,
                overruns = self.stats.overruns,
                "cycle overrun"
            );
        }
    }
}

fn elapsed_ns(elapsed: Duration) -> i64 {
    i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX)
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// `a - b` in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}
