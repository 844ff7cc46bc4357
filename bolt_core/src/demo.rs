//! Simulated practice robot: a conveyor feeding a shooter, driven by a
//! scripted autonomous routine.
//!
//! ```text
//!   robot (Passive)
//!   ├── conveyor (Conveyor)   default: Idle
//!   └── shooter  (Shooter)    default: Idle
//! ```
//!
//! [`BallField`] stands in for the physical world. It moves balls along the
//! belt from the commanded motor powers and writes the beam-break readings
//! back into the [`ScriptedIo`] the conveyor samples.
//!
//! Positions are in belt units along this layout:
//!
//! ```text
//!   0.0        1.0   1.3                        2.6  2.7
//!   │ intake   │entry│ ═════════ belt ═════════ │exit│ shooter
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info};

use crate::action::basic::{IdleAction, InstantAction};
use crate::action::dispatch::DispatchAction;
use crate::action::sequence::SequenceAction;
use crate::action::{Action, ActionIds, BoxedAction};
use crate::config::BoltConfig;
use crate::conveyor::{Conveyor, ConveyorActions, ScriptedIo};
use crate::error::{ActionError, BootError, ProgramError};
use crate::robot::{ControlContext, Controller, Robot};
use crate::subsystem::tree::SubsystemTree;
use crate::subsystem::{Mechanism, Passive, SubsystemId};

const ENTRY_START: f64 = 1.0;
const ENTRY_END: f64 = 1.3;
const EXIT_START: f64 = 2.6;
const EXIT_END: f64 = 2.7;
/// Where the front ball rests against an idle shooter wheel.
const SHOOTER_STOP: f64 = 2.65;
/// Closest two balls can sit.
const BALL_SPACING: f64 = 0.25;
/// Belt units per second at power 1.0.
const SPEED_PER_POWER: f64 = 2.5;
/// Time between two balls picked up by a running intake.
const PICKUP_INTERVAL_S: f64 = 1.0;
/// The intake throat must be clear up to here before the next pickup.
const THROAT_CLEAR: f64 = 0.5;

// ─── Shooter ────────────────────────────────────────────────────────

/// Flywheel that lets balls leave the conveyor while spinning.
#[derive(Debug, Default)]
pub struct Shooter {
    spinning: bool,
}

impl Shooter {
    pub fn spin_up(&mut self) {
        self.spinning = true;
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning
    }
}

impl Mechanism for Shooter {
    fn stop(&mut self) {
        self.spinning = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ─── Ball Field ─────────────────────────────────────────────────────

#[derive(Debug)]
struct Field {
    io: ScriptedIo,
    /// Ball positions, front ball first.
    balls: Vec<f64>,
    supply: u32,
    fired: u32,
    pickup_timer: f64,
}

/// Ball physics for the simulated conveyor. Clones share the same field.
#[derive(Debug, Clone)]
pub struct BallField {
    inner: Rc<RefCell<Field>>,
}

impl BallField {
    /// A field with `supply` balls to pick up and, if `preload`, one ball
    /// already sitting on the entry sensor.
    pub fn new(io: ScriptedIo, supply: u32, preload: bool) -> Self {
        let balls = if preload { vec![ENTRY_START] } else { Vec::new() };
        let field = Field {
            io,
            balls,
            supply,
            fired: 0,
            pickup_timer: PICKUP_INTERVAL_S,
        };
        field.write_sensors();
        Self {
            inner: Rc::new(RefCell::new(field)),
        }
    }

    /// Balls that left through the shooter.
    pub fn fired(&self) -> u32 {
        self.inner.borrow().fired
    }

    /// Balls between the intake and the shooter.
    pub fn on_belt(&self) -> usize {
        self.inner.borrow().balls.len()
    }

    /// Balls still waiting to be picked up.
    pub fn supply(&self) -> u32 {
        self.inner.borrow().supply
    }

    /// Advance the field by `dt` under the current motor powers.
    pub fn step(&self, dt: Duration, shooter_spinning: bool) {
        self.inner.borrow_mut().step(dt.as_secs_f64(), shooter_spinning);
    }
}

impl Field {
    fn step(&mut self, dt: f64, shooter_spinning: bool) {
        let intake = self.io.intake_power().max(0.0) * SPEED_PER_POWER;
        let belt = self.io.belt_power().max(0.0) * SPEED_PER_POWER;

        let mut ahead: Option<f64> = None;
        for pos in self.balls.iter_mut() {
            let speed = if *pos < ENTRY_START { intake } else { belt };
            let limit = match ahead {
                Some(front) => front - BALL_SPACING,
                None if shooter_spinning => f64::INFINITY,
                None => SHOOTER_STOP,
            };
            *pos = (*pos + speed * dt).min(limit).max(*pos);
            ahead = Some(*pos);
        }

        let before = self.balls.len();
        self.balls.retain(|pos| *pos < EXIT_END);
        let fired = (before - self.balls.len()) as u32;
        if fired > 0 {
            self.fired += fired;
            debug!(fired = self.fired, "ball fired");
        }

        if intake > 0.0 {
            self.pickup_timer += dt;
            let throat_clear = self.balls.last().is_none_or(|pos| *pos >= THROAT_CLEAR);
            if self.supply > 0 && throat_clear && self.pickup_timer >= PICKUP_INTERVAL_S {
                self.balls.push(0.0);
                self.supply -= 1;
                self.pickup_timer = 0.0;
                debug!(supply = self.supply, "ball picked up");
            }
        }

        self.write_sensors();
    }

    fn write_sensors(&self) {
        let blocked = |start: f64, end: f64| self.balls.iter().any(|pos| (start..end).contains(pos));
        self.io.set_entry(blocked(ENTRY_START, ENTRY_END));
        self.io.set_exit(blocked(EXIT_START, EXIT_END));
    }
}

// ─── Autonomous Routine ─────────────────────────────────────────────

/// Stage the preloaded ball, fill the conveyor, then fire everything.
pub fn routine(
    ids: &ActionIds,
    conveyor: &ConveyorActions,
    shooter: SubsystemId,
) -> Result<SequenceAction, ProgramError> {
    let step = |action: BoxedAction| DispatchAction::new(ids, action).blocking(true).boxed();

    let children = vec![
        step(conveyor.prepare_to_receive()?.boxed()),
        step(conveyor.receive()?.boxed()),
        step(conveyor.prepare_to_fire()?.boxed()),
        InstantAction::new(ids, shooter, "SpinUp", move |ctx| {
            ctx.tree.mechanism_mut::<Shooter>(shooter)?.spin_up();
            Ok(())
        })
        .boxed(),
        step(conveyor.fire()?.boxed()),
        InstantAction::new(ids, shooter, "SpinDown", move |ctx| {
            ctx.tree.stop_mechanism(shooter);
            Ok(())
        })
        .boxed(),
    ];
    Ok(SequenceAction::new(ids, SubsystemId::ROOT, children).named("Autonomous"))
}

/// Steps the field and launches the routine on its first turn.
pub struct Autonomous {
    field: BallField,
    shooter: SubsystemId,
    routine: Option<BoxedAction>,
}

impl Controller for Autonomous {
    fn name(&self) -> &'static str {
        "autonomous"
    }

    fn run(&mut self, ctx: &mut ControlContext<'_>) -> Result<(), ActionError> {
        let spinning = ctx.tree.mechanism::<Shooter>(self.shooter)?.is_spinning();
        self.field.step(ctx.clock.dt(), spinning);

        if let Some(routine) = self.routine.take() {
            ctx.set_action(SubsystemId::ROOT, routine, false)
                .map_err(|r| ActionError::Failed(format!("autonomous routine rejected: {r}")))?;
            info!("autonomous routine started");
        }
        Ok(())
    }
}

// ─── Assembly ───────────────────────────────────────────────────────

/// Everything the binary needs to run the simulated robot.
pub struct Demo {
    pub robot: Robot,
    pub controller: Autonomous,
    pub field: BallField,
    pub io: ScriptedIo,
    pub conveyor: SubsystemId,
    pub shooter: SubsystemId,
}

impl Demo {
    /// Build the tree, validate every conveyor program and prepare the
    /// routine. The conveyor starts with one preloaded ball.
    pub fn build(config: &BoltConfig) -> Result<Self, BootError> {
        let ids = ActionIds::new();
        let io = ScriptedIo::new();
        let field = BallField::new(io.clone(), u32::from(config.conveyor.capacity) * 2, true);

        let mut conveyor_mech = Conveyor::new(io.clone(), config.conveyor.capacity);
        conveyor_mech.set_ball_count(1);

        let mut tree = SubsystemTree::new("robot", Passive)?;
        let conveyor = tree.add_subsystem(SubsystemId::ROOT, "conveyor", conveyor_mech)?;
        let shooter = tree.add_subsystem(SubsystemId::ROOT, "shooter", Shooter::default())?;

        let actions = ConveyorActions::new(&ids, conveyor, config.conveyor.clone());
        actions.validate_all()?;
        let routine = routine(&ids, &actions, shooter)?;

        let mut robot = Robot::new(tree, ids.clone());
        robot.set_default_action(conveyor, IdleAction::new(&ids, conveyor).boxed())?;
        robot.set_default_action(shooter, IdleAction::new(&ids, shooter).boxed())?;

        info!(
            subsystems = robot.tree().len(),
            capacity = config.conveyor.capacity,
            "robot assembled"
        );

        Ok(Self {
            robot,
            controller: Autonomous {
                field: field.clone(),
                shooter,
                routine: Some(routine.boxed()),
            },
            field,
            io,
            conveyor,
            shooter,
        })
    }
}
