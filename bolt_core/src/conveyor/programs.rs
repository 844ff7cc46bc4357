//! Conveyor programs.
//!
//! | Program              | Ends with                                         |
//! |----------------------|---------------------------------------------------|
//! | `prepare_to_receive` | ball moved from entry to exit, `STAGED_FOR_COLLECT` |
//! | `receive`            | conveyor full (or `JAMMED`)                        |
//! | `prepare_to_fire`    | first ball at the exit, `STAGED_FOR_FIRE`          |
//! | `fire`               | conveyor empty (or `JAMMED`)                       |
//!
//! Every sensor wait that depends on a ball actually moving is bounded by
//! `sensor_timeout` and jumps to a `jam` state that stops both motors.

use std::time::Duration;

use tracing::{debug, warn};

use super::mechanism::{Conveyor, ConveyorFlags};
use crate::action::ActionIds;
use crate::clock::Clock;
use crate::config::ConveyorConfig;
use crate::error::ProgramError;
use crate::interp::{Program, ProgramBuilder, ProgramHooks, StateMachineAction, StateView, WorkResult};
use crate::sensor::SensorCondition::{Falling, IsHigh, IsLow, Rising};
use crate::subsystem::SubsystemId;

use super::mechanism::ConveyorSensor::{Entry, Exit};

/// Label of the `fire` state during which the belt ramps up.
pub const FEED_LABEL: &str = "feed";

pub type ConveyorStateAction = StateMachineAction<Conveyor, ConveyorHooks>;

// ─── Hooks ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Ramp {
    power: f64,
    duration: Duration,
}

/// Continuous belt effects for conveyor programs.
///
/// While a program with a ramp sits in [`FEED_LABEL`], the belt power rises
/// linearly from zero to the target over the ramp duration, restarting each
/// time the state is re-entered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConveyorHooks {
    ramp: Option<Ramp>,
}

impl ConveyorHooks {
    pub fn with_ramp(power: f64, duration: Duration) -> Self {
        Self {
            ramp: Some(Ramp { power, duration }),
        }
    }

    /// Belt power `elapsed` into the feed state.
    pub fn ramp_power(&self, elapsed: Duration) -> Option<f64> {
        let ramp = self.ramp?;
        if ramp.duration.is_zero() {
            return Some(ramp.power);
        }
        let fraction = (elapsed.as_secs_f64() / ramp.duration.as_secs_f64()).min(1.0);
        Some(ramp.power * fraction)
    }
}

impl ProgramHooks<Conveyor> for ConveyorHooks {
    fn on_started(&mut self, conveyor: &mut Conveyor, _clock: &Clock) {
        debug!(
            balls = conveyor.ball_count(),
            flags = ?conveyor.flags(),
            "conveyor program started"
        );
    }

    fn on_running(&mut self, conveyor: &mut Conveyor, state: StateView, clock: &Clock) {
        if state.label != Some(FEED_LABEL) {
            return;
        }
        if let Some(power) = self.ramp_power(clock.elapsed_since(state.entered_at)) {
            conveyor.set_belt_power(power);
        }
    }

    fn on_finished(&mut self, conveyor: &mut Conveyor, _clock: &Clock) {
        if conveyor.has(ConveyorFlags::JAMMED) {
            warn!(balls = conveyor.ball_count(), "conveyor jammed");
        }
    }
}

// ─── Shared states ──────────────────────────────────────────────────

fn stop(conveyor: &mut Conveyor, _clock: &Clock) -> WorkResult {
    conveyor.stop_motors();
    WorkResult::ActionDone
}

fn jam(conveyor: &mut Conveyor, _clock: &Clock) -> WorkResult {
    conveyor.set_flags(ConveyorFlags::JAMMED);
    conveyor.clear_flags(ConveyorFlags::COLLECTING);
    conveyor.stop_motors();
    WorkResult::ActionDone
}

// ─── Programs ───────────────────────────────────────────────────────

/// Carry a ball from the entry sensor to the exit sensor and park it there.
///
/// With no ball at the entry before the timeout the belt just stops.
pub fn prepare_to_receive(config: &ConveyorConfig) -> Result<Program<Conveyor>, ProgramError> {
    let belt = config.belt_power;
    let timeout = config.sensor_timeout();

    ProgramBuilder::<Conveyor>::new("prepare_to_receive")
        .assert("conveyor is not jammed", |c: &Conveyor| !c.has(ConveyorFlags::JAMMED))
        .do_work(move |c, _| {
            c.clear_flags(ConveyorFlags::STAGED_FOR_COLLECT | ConveyorFlags::STAGED_FOR_FIRE);
            c.set_belt_power(belt);
            WorkResult::NextState
        })
        .label("entry")
        .wait_for_or_timeout(Entry, IsHigh, timeout, "stop")
        .label("clear")
        .wait_for_or_timeout(Entry, IsLow, timeout, "jam")
        .label("stage")
        .wait_for_or_timeout(Exit, IsHigh, timeout, "jam")
        .do_work(|c, _| {
            c.set_flags(ConveyorFlags::STAGED_FOR_COLLECT);
            WorkResult::NextState
        })
        .goto("stop")
        .label("jam")
        .do_work(jam)
        .label("stop")
        .do_work(stop)
        .build()
}

/// Run the intake and count balls until the conveyor is full.
///
/// Waiting for the next ball is unbounded; only a ball stuck on the entry
/// sensor counts as a jam.
pub fn receive(config: &ConveyorConfig) -> Result<Program<Conveyor>, ProgramError> {
    let intake = config.intake_power;
    let belt = config.belt_power;
    let timeout = config.sensor_timeout();

    ProgramBuilder::<Conveyor>::new("receive")
        .do_work(move |c, _| {
            c.set_flags(ConveyorFlags::COLLECTING);
            c.set_intake_power(intake);
            WorkResult::NextState
        })
        .label("wait")
        .branch("full", |c: &Conveyor| c.is_full())
        .wait_for(Entry, Rising)
        .do_work(move |c, _| {
            c.add_ball();
            c.set_belt_power(belt);
            WorkResult::NextState
        })
        .assert("ball count within capacity", |c: &Conveyor| {
            c.ball_count() <= c.capacity()
        })
        .wait_for_or_timeout(Entry, IsLow, timeout, "jam")
        .do_work(|c, _| {
            c.set_belt_power(0.0);
            WorkResult::NextState
        })
        .goto("wait")
        .label("full")
        .do_work(|c, _| {
            c.clear_flags(ConveyorFlags::COLLECTING);
            c.stop_motors();
            WorkResult::ActionDone
        })
        .label("jam")
        .do_work(jam)
        .build()
}

/// Move the first ball up to the exit sensor.
pub fn prepare_to_fire(config: &ConveyorConfig) -> Result<Program<Conveyor>, ProgramError> {
    let belt = config.belt_power;
    let timeout = config.sensor_timeout();

    ProgramBuilder::<Conveyor>::new("prepare_to_fire")
        .branch("empty", |c: &Conveyor| c.is_empty())
        .do_work(move |c, _| {
            c.clear_flags(ConveyorFlags::STAGED_FOR_COLLECT);
            c.set_belt_power(belt);
            WorkResult::NextState
        })
        .wait_for_or_timeout(Exit, IsHigh, timeout, "jam")
        .do_work(|c, _| {
            c.set_flags(ConveyorFlags::STAGED_FOR_FIRE);
            c.stop_motors();
            WorkResult::ActionDone
        })
        .label("jam")
        .do_work(jam)
        .label("empty")
        .do_work(stop)
        .build()
}

/// Feed every ball past the exit sensor, pausing between shots.
pub fn fire(config: &ConveyorConfig) -> Result<Program<Conveyor>, ProgramError> {
    let timeout = config.sensor_timeout();

    ProgramBuilder::<Conveyor>::new("fire")
        .do_work(|c, _| {
            c.clear_flags(ConveyorFlags::STAGED_FOR_FIRE | ConveyorFlags::STAGED_FOR_COLLECT);
            WorkResult::NextState
        })
        .label("next")
        .branch("empty", |c: &Conveyor| c.is_empty())
        .label(FEED_LABEL)
        .wait_for_or_timeout(Exit, Falling, timeout, "jam")
        .do_work(|c, _| {
            c.remove_ball();
            c.set_belt_power(0.0);
            WorkResult::NextState
        })
        .delay(config.fire_delay())
        .goto("next")
        .label("empty")
        .do_work(stop)
        .label("jam")
        .do_work(jam)
        .build()
}

// ─── Action factory ─────────────────────────────────────────────────

/// Builds conveyor actions bound to one conveyor subsystem.
#[derive(Debug, Clone)]
pub struct ConveyorActions {
    ids: ActionIds,
    subsystem: SubsystemId,
    config: ConveyorConfig,
}

impl ConveyorActions {
    pub fn new(ids: &ActionIds, subsystem: SubsystemId, config: ConveyorConfig) -> Self {
        Self {
            ids: ids.clone(),
            subsystem,
            config,
        }
    }

    pub fn subsystem(&self) -> SubsystemId {
        self.subsystem
    }

    /// Build every program once, failing on the first malformed one.
    pub fn validate_all(&self) -> Result<(), ProgramError> {
        for build in [prepare_to_receive, receive, prepare_to_fire, fire] {
            let program = build(&self.config)?;
            debug!(program = program.name(), states = program.len(), "program validated");
        }
        Ok(())
    }

    pub fn prepare_to_receive(&self) -> Result<ConveyorStateAction, ProgramError> {
        Ok(self.action(prepare_to_receive(&self.config)?, ConveyorHooks::default()))
    }

    pub fn receive(&self) -> Result<ConveyorStateAction, ProgramError> {
        Ok(self.action(receive(&self.config)?, ConveyorHooks::default()))
    }

    pub fn prepare_to_fire(&self) -> Result<ConveyorStateAction, ProgramError> {
        Ok(self.action(prepare_to_fire(&self.config)?, ConveyorHooks::default()))
    }

    pub fn fire(&self) -> Result<ConveyorStateAction, ProgramError> {
        let hooks = ConveyorHooks::with_ramp(self.config.fire_power, self.config.fire_ramp());
        Ok(self.action(fire(&self.config)?, hooks))
    }

    fn action(&self, program: Program<Conveyor>, hooks: ConveyorHooks) -> ConveyorStateAction {
        StateMachineAction::with_hooks(&self.ids, self.subsystem, program, hooks)
    }
}
