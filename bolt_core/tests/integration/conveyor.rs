//! Integration test: conveyor programs installed on a subsystem tree and
//! driven by scripted beam-break sensors.

use bolt_core::action::basic::IdleAction;
use bolt_core::action::Action;
use bolt_core::config::ConveyorConfig;
use bolt_core::conveyor::{Conveyor, ConveyorActions, ConveyorFlags, ScriptedIo};
use bolt_core::subsystem::SubsystemId;
use bolt_core::subsystem::tree::SlotState;

use super::common::Rig;

struct Belt {
    rig: Rig,
    io: ScriptedIo,
    conveyor: SubsystemId,
    actions: ConveyorActions,
}

impl Belt {
    fn new() -> Self {
        let mut rig = Rig::new();
        let io = ScriptedIo::new();
        let conveyor = rig
            .tree
            .add_subsystem(SubsystemId::ROOT, "conveyor", Conveyor::new(io.clone(), 3))
            .unwrap();
        let actions = ConveyorActions::new(&rig.ids, conveyor, ConveyorConfig::default());
        Self {
            rig,
            io,
            conveyor,
            actions,
        }
    }

    fn state(&self) -> &Conveyor {
        self.rig.tree.mechanism::<Conveyor>(self.conveyor).unwrap()
    }

    fn busy(&self) -> bool {
        self.rig.tree.is_busy(self.conveyor)
    }
}

#[test]
fn prepare_to_receive_parks_ball_at_exit() {
    let mut belt = Belt::new();
    let action = belt.actions.prepare_to_receive().unwrap();
    belt.rig
        .tree
        .set_action(belt.conveyor, action.boxed(), false, &belt.rig.clock)
        .unwrap();

    belt.rig.tick();
    assert_eq!(belt.io.belt_power(), ConveyorConfig::default().belt_power);

    // Ball reaches the entry sensor, passes it, then arrives at the exit.
    belt.io.set_entry(true);
    belt.rig.tick();
    belt.io.set_entry(false);
    belt.rig.tick();
    assert!(belt.busy());
    belt.io.set_exit(true);
    belt.rig.tick();

    assert!(!belt.busy());
    assert_eq!(belt.io.belt_power(), 0.0);
    assert_eq!(belt.io.intake_power(), 0.0);
    assert!(belt.state().has(ConveyorFlags::STAGED_FOR_COLLECT));
    assert!(!belt.state().has(ConveyorFlags::STAGED_FOR_FIRE));
    assert!(!belt.state().has(ConveyorFlags::JAMMED));
}

#[test]
fn prepare_to_receive_without_ball_stops_quietly() {
    let mut belt = Belt::new();
    let action = belt.actions.prepare_to_receive().unwrap();
    belt.rig
        .tree
        .set_action(belt.conveyor, action.boxed(), false, &belt.rig.clock)
        .unwrap();

    // 1500ms timeout at 20ms per tick.
    for _ in 0..80 {
        belt.rig.tick();
    }

    assert!(!belt.busy());
    assert_eq!(belt.io.belt_power(), 0.0);
    assert!(belt.state().flags().is_empty());
}

#[test]
fn ball_stuck_between_sensors_jams() {
    let mut belt = Belt::new();
    let action = belt.actions.prepare_to_receive().unwrap();
    belt.rig
        .tree
        .set_action(belt.conveyor, action.boxed(), false, &belt.rig.clock)
        .unwrap();
    belt.rig.tick();
    belt.io.set_entry(true);
    belt.rig.tick();
    belt.io.set_entry(false);

    for _ in 0..80 {
        belt.rig.tick();
    }

    assert!(!belt.busy());
    assert!(belt.state().has(ConveyorFlags::JAMMED));
    assert!(!belt.state().has(ConveyorFlags::STAGED_FOR_COLLECT));
    assert_eq!(belt.io.belt_power(), 0.0);
}

#[test]
fn new_program_preempts_running_one() {
    let mut belt = Belt::new();
    let receive = belt.actions.receive().unwrap();
    belt.rig
        .tree
        .set_action(belt.conveyor, receive.boxed(), false, &belt.rig.clock)
        .unwrap();
    belt.rig.tick();
    assert_eq!(belt.io.intake_power(), ConveyorConfig::default().intake_power);

    let fire = belt.actions.prepare_to_fire().unwrap();
    belt.rig
        .tree
        .set_action(belt.conveyor, fire.boxed(), false, &belt.rig.clock)
        .unwrap();

    // Cancelling `receive` stopped both motors before the new program started.
    assert_eq!(belt.io.intake_power(), 0.0);
    assert_eq!(belt.io.belt_power(), 0.0);

    // Nothing counted, so the new program finds the conveyor empty.
    belt.rig.tick();
    assert!(!belt.busy());
    assert_eq!(belt.state().ball_count(), 0);
}

#[test]
fn default_takes_over_when_program_finishes() {
    let mut belt = Belt::new();
    let idle = IdleAction::new(&belt.rig.ids, belt.conveyor);
    belt.rig
        .tree
        .set_default_action(belt.conveyor, idle.boxed(), &belt.rig.clock)
        .unwrap();
    belt.rig.tick();
    assert_eq!(belt.rig.tree.slot_state(belt.conveyor), SlotState::RunningDefault);

    let action = belt.actions.prepare_to_fire().unwrap();
    belt.rig
        .tree
        .set_action(belt.conveyor, action.boxed(), false, &belt.rig.clock)
        .unwrap();
    assert_eq!(belt.rig.tree.slot_state(belt.conveyor), SlotState::RunningNonDefault);

    // Empty conveyor: the program finishes and the default resumes in the same tick.
    belt.rig.tick();
    assert_eq!(belt.rig.tree.slot_state(belt.conveyor), SlotState::RunningDefault);
}
