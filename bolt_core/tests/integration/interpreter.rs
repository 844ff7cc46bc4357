//! Integration test: a program for a mechanism defined outside the crate,
//! installed on a subsystem and ticked by the tree.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use bolt_core::action::Action;
use bolt_core::clock::Clock;
use bolt_core::error::ProgramError;
use bolt_core::interp::{Machine, ProgramBuilder, StateMachineAction, WorkResult};
use bolt_core::sensor::{SensorCondition, SensorSample};
use bolt_core::subsystem::{Mechanism, SubsystemId};

use super::common::Rig;

/// Limit switch wired straight to the test.
#[derive(Debug, Clone, Default)]
struct Switch(Rc<Cell<bool>>);

impl Switch {
    fn press(&self, pressed: bool) {
        self.0.set(pressed);
    }
}

/// A latch gate with one limit switch.
#[derive(Debug, Default)]
struct Gate {
    switch: Switch,
    closed: SensorSample,
    motor: f64,
    stops: u32,
}

#[derive(Debug, Clone, Copy)]
enum GateSensor {
    Closed,
}

impl Mechanism for Gate {
    fn compute_state(&mut self, _clock: &Clock) {
        self.closed.sample(self.switch.0.get());
    }

    fn stop(&mut self) {
        self.motor = 0.0;
        self.stops += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Machine for Gate {
    type Sensor = GateSensor;

    fn sensor(&self, sensor: GateSensor) -> SensorSample {
        match sensor {
            GateSensor::Closed => self.closed,
        }
    }
}

fn gate_rig() -> (Rig, SubsystemId, Switch) {
    let mut rig = Rig::new();
    let switch = Switch::default();
    let gate = rig
        .tree
        .add_subsystem(
            SubsystemId::ROOT,
            "gate",
            Gate {
                switch: switch.clone(),
                ..Gate::default()
            },
        )
        .unwrap();
    (rig, gate, switch)
}

fn gate(rig: &Rig, id: SubsystemId) -> &Gate {
    rig.tree.mechanism::<Gate>(id).unwrap()
}

#[test]
fn work_goto_work_completes_in_one_tick() {
    let (mut rig, id, _switch) = gate_rig();
    let program = ProgramBuilder::<Gate>::new("round_trip")
        .do_work(|gate, _| {
            gate.motor = 0.3;
            WorkResult::NextState
        })
        .goto("L")
        .do_work(|gate, _| {
            gate.motor = 1.0;
            WorkResult::NextState
        })
        .label("L")
        .do_work(|_, _| WorkResult::ActionDone)
        .build()
        .unwrap();
    let action = StateMachineAction::new(&rig.ids, id, program);
    rig.tree.set_action(id, action.boxed(), false, &rig.clock).unwrap();
    assert!(rig.tree.is_busy(id));

    rig.tick();

    assert!(!rig.tree.is_busy(id));
    assert_eq!(gate(&rig, id).motor, 0.3);
}

#[test]
fn close_gate_until_switch_or_give_up() {
    let (mut rig, id, switch) = gate_rig();
    let build = || {
        ProgramBuilder::<Gate>::new("close")
            .do_work(|gate, _| {
                gate.motor = -0.5;
                WorkResult::NextState
            })
            .wait_for_or_timeout(
                GateSensor::Closed,
                SensorCondition::Rising,
                Duration::from_millis(100),
                "stuck",
            )
            .do_work(|gate, _| {
                gate.motor = 0.0;
                WorkResult::ActionDone
            })
            .label("stuck")
            .do_work(|gate, _| {
                gate.motor = 0.1;
                WorkResult::ActionDone
            })
            .build()
    };

    // Switch closes on the third tick.
    let action = StateMachineAction::new(&rig.ids, id, build().unwrap());
    rig.tree.set_action(id, action.boxed(), false, &rig.clock).unwrap();
    rig.tick();
    rig.tick();
    assert_eq!(gate(&rig, id).motor, -0.5);
    switch.press(true);
    rig.tick();
    assert!(!rig.tree.is_busy(id));
    assert_eq!(gate(&rig, id).motor, 0.0);

    // Switch never closes: five 20ms ticks after entering the wait is not
    // yet a timeout, the sixth is.
    switch.press(false);
    rig.tick();
    let action = StateMachineAction::new(&rig.ids, id, build().unwrap());
    rig.tree.set_action(id, action.boxed(), false, &rig.clock).unwrap();
    for _ in 0..6 {
        rig.tick();
    }
    assert!(rig.tree.is_busy(id));
    rig.tick();
    assert!(!rig.tree.is_busy(id));
    assert_eq!(gate(&rig, id).motor, 0.1);
}

#[test]
fn unresolved_labels_fail_the_build() {
    let unknown = ProgramBuilder::<Gate>::new("lost")
        .branch("nowhere", |gate: &Gate| gate.motor > 0.0)
        .do_work(|_, _| WorkResult::ActionDone)
        .build();
    assert!(matches!(
        unknown,
        Err(ProgramError::UnknownLabel { label: "nowhere", .. })
    ));

    let dangling = ProgramBuilder::<Gate>::new("trailing")
        .do_work(|_, _| WorkResult::ActionDone)
        .label("end")
        .build();
    assert!(matches!(dangling, Err(ProgramError::DanglingLabel { .. })));
}

#[test]
fn preempting_a_program_stops_the_gate() {
    let (mut rig, id, _switch) = gate_rig();
    let program = ProgramBuilder::<Gate>::new("hold_open")
        .do_work(|gate, _| {
            gate.motor = 0.8;
            WorkResult::NextState
        })
        .wait_for(GateSensor::Closed, SensorCondition::IsHigh)
        .build()
        .unwrap();
    let action = StateMachineAction::new(&rig.ids, id, program);
    rig.tree.set_action(id, action.boxed(), false, &rig.clock).unwrap();
    rig.tick();
    assert_eq!(gate(&rig, id).motor, 0.8);

    rig.tree.cancel_action(id, &rig.clock).unwrap();

    assert_eq!(gate(&rig, id).motor, 0.0);
    assert_eq!(gate(&rig, id).stops, 1);
    assert!(!rig.tree.is_busy(id));
}
