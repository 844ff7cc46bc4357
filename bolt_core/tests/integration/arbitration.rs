//! Integration test: subsystem slot arbitration across a three-level tree.
//!
//! ```text
//! robot
//! └── arm
//!     ├── wrist
//!     └── claw
//! ```

use bolt_core::action::Action;
use bolt_core::error::Rejection;
use bolt_core::subsystem::SubsystemId;
use bolt_core::subsystem::tree::SlotState;

use super::common::{Drive, Journal, Rig};

struct Arm {
    rig: Rig,
    arm: SubsystemId,
    wrist: SubsystemId,
    claw: SubsystemId,
    journal: Journal,
}

fn arm() -> Arm {
    let mut rig = Rig::new();
    let arm = rig.add(SubsystemId::ROOT, "arm");
    let wrist = rig.add(arm, "wrist");
    let claw = rig.add(arm, "claw");
    Arm {
        rig,
        arm,
        wrist,
        claw,
        journal: Journal::default(),
    }
}

#[test]
fn busy_predicates_walk_up_and_down() {
    let Arm {
        mut rig,
        arm,
        wrist,
        claw,
        journal,
    } = arm();

    assert!(!rig.tree.is_busy(wrist));
    let action = Drive::endless(&rig.ids, wrist, "tilt", 0.2, &journal);
    rig.tree.set_action(wrist, action.boxed(), false, &rig.clock).unwrap();

    assert!(rig.tree.is_busy(wrist));
    assert!(!rig.tree.is_busy(arm));
    assert!(rig.tree.is_busy_or_child_busy(arm));
    assert!(rig.tree.is_busy_or_child_busy(SubsystemId::ROOT));
    assert!(!rig.tree.is_any_parent_busy(claw));
    assert!(rig.tree.is_any_parent_busy(wrist));
    assert_eq!(rig.tree.slot_state(wrist), SlotState::RunningNonDefault);
}

#[test]
fn busy_ancestor_rejects_child_and_changes_nothing() {
    let Arm {
        mut rig,
        arm,
        wrist,
        journal,
        ..
    } = arm();
    rig.tree
        .set_default_action(wrist, Drive::endless(&rig.ids, wrist, "level", 0.1, &journal).boxed(), &rig.clock)
        .unwrap();
    rig.tick();

    let sweep = Drive::endless(&rig.ids, arm, "sweep", 0.7, &journal);
    let sweep_id = sweep.id();
    rig.tree.set_action(arm, sweep.boxed(), false, &rig.clock).unwrap();
    rig.tick();
    journal.take();
    let wrist_before = rig.tree.current_action_id(wrist);

    let tilt = Drive::endless(&rig.ids, wrist, "tilt", 0.2, &journal);
    let result = rig.tree.set_action(wrist, tilt.boxed(), false, &rig.clock);

    assert_eq!(result, Err(Rejection::AncestorBusy { ancestor: arm }));
    assert_eq!(rig.tree.current_action_id(wrist), wrist_before);
    assert_eq!(rig.tree.current_action_id(arm), Some(sweep_id));
    assert!(journal.take().is_empty());

    // Overriding the ancestor is allowed when asked for.
    let tilt = Drive::endless(&rig.ids, wrist, "tilt", 0.2, &journal);
    rig.tree.set_action(wrist, tilt.boxed(), true, &rig.clock).unwrap();
    assert!(rig.tree.is_busy(wrist));
    assert!(rig.tree.is_busy(arm));
}

#[test]
fn new_parent_action_cancels_descendants() {
    let Arm {
        mut rig,
        arm,
        wrist,
        claw,
        journal,
    } = arm();
    for (id, name) in [(wrist, "tilt"), (claw, "grip")] {
        let action = Drive::endless(&rig.ids, id, name, 0.6, &journal);
        rig.tree.set_action(id, action.boxed(), false, &rig.clock).unwrap();
    }
    journal.take();

    let stow = Drive::endless(&rig.ids, arm, "stow", 0.4, &journal);
    rig.tree.set_action(arm, stow.boxed(), false, &rig.clock).unwrap();

    assert_eq!(journal.take(), vec!["cancel:tilt", "cancel:grip", "start:stow"]);
    assert_eq!(rig.power(wrist), 0.0);
    assert_eq!(rig.power(claw), 0.0);
    assert!(!rig.tree.is_busy_or_child_busy(wrist));
}

#[test]
fn running_default_is_not_busy() {
    let Arm {
        mut rig,
        claw,
        journal,
        ..
    } = arm();
    let hold = Drive::endless(&rig.ids, claw, "hold", 0.1, &journal);
    let twin = Drive::endless(&rig.ids, claw, "hold", 0.1, &journal);
    let hold_id = hold.id();
    rig.tree.set_default_action(claw, hold.boxed(), &rig.clock).unwrap();
    rig.tick();
    assert_eq!(rig.tree.default_action_id(claw), Some(hold_id));
    assert_eq!(rig.tree.slot_state(claw), SlotState::RunningDefault);
    assert!(!rig.tree.is_busy(claw));

    // Same name, different id: a regular command that preempts the default.
    rig.tree.set_action(claw, twin.boxed(), false, &rig.clock).unwrap();
    assert!(rig.tree.is_busy(claw));
    assert_eq!(rig.tree.default_action_id(claw), Some(hold_id));
}

#[test]
fn cancel_falls_back_to_default() {
    let Arm {
        mut rig,
        claw,
        journal,
        ..
    } = arm();
    rig.tree
        .set_default_action(claw, Drive::endless(&rig.ids, claw, "hold", 0.1, &journal).boxed(), &rig.clock)
        .unwrap();
    let grip = Drive::endless(&rig.ids, claw, "grip", 0.8, &journal);
    rig.tree.set_action(claw, grip.boxed(), false, &rig.clock).unwrap();
    assert_eq!(rig.power(claw), 0.8);
    journal.take();

    rig.tree.cancel_action(claw, &rig.clock).unwrap();
    assert_eq!(journal.take(), vec!["cancel:grip", "start:hold"]);
    assert_eq!(rig.tree.slot_state(claw), SlotState::RunningDefault);
    assert_eq!(rig.power(claw), 0.1);
}

#[test]
fn finished_default_sits_out_one_tick() {
    let Arm {
        mut rig,
        claw,
        journal,
        ..
    } = arm();
    let pulse = Drive::finishing(&rig.ids, claw, "pulse", 0, &journal);
    rig.tree.set_default_action(claw, pulse.boxed(), &rig.clock).unwrap();

    for _ in 0..4 {
        rig.tick();
    }

    // Installed, finished, skipped, installed again.
    assert_eq!(journal.count("start:pulse"), 2);
    assert_eq!(journal.count("run:pulse"), 0);
}

#[test]
fn failing_action_is_cancelled_and_default_resumes() {
    let Arm {
        mut rig,
        wrist,
        journal,
        ..
    } = arm();
    rig.tree
        .set_default_action(wrist, Drive::endless(&rig.ids, wrist, "level", 0.1, &journal).boxed(), &rig.clock)
        .unwrap();
    let flaky = Drive::endless(&rig.ids, wrist, "flaky", 0.9, &journal).failing_at(2);
    rig.tree.set_action(wrist, flaky.boxed(), false, &rig.clock).unwrap();

    rig.tick();
    assert_eq!(rig.power(wrist), 0.9);
    rig.tick();

    assert!(!rig.tree.is_busy(wrist));
    assert_eq!(rig.tree.slot_state(wrist), SlotState::RunningDefault);
    assert_eq!(rig.power(wrist), 0.1);
    assert!(journal.take().ends_with(&[
        "run:flaky".to_string(),
        "cancel:flaky".to_string(),
        "start:level".to_string(),
    ]));
}

#[test]
fn shutdown_zeroes_every_output() {
    let Arm {
        mut rig,
        arm,
        wrist,
        claw,
        journal,
    } = arm();
    for (id, name) in [(wrist, "tilt"), (claw, "grip")] {
        let action = Drive::endless(&rig.ids, id, name, 0.6, &journal);
        rig.tree.set_action(id, action.boxed(), true, &rig.clock).unwrap();
    }
    rig.tree.shutdown(&rig.clock);

    for id in [arm, wrist, claw] {
        assert!(!rig.tree.is_busy(id));
        assert_eq!(rig.power(id), 0.0);
    }
}
