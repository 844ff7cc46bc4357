//! Integration test: sequence, parallel and dispatch driving real subsystems.

use bolt_core::action::dispatch::DispatchAction;
use bolt_core::action::parallel::ParallelAction;
use bolt_core::action::sequence::SequenceAction;
use bolt_core::action::Action;
use bolt_core::subsystem::SubsystemId;

use super::common::{Drive, Journal, Rig};

#[test]
fn non_blocking_dispatches_chain_at_start() {
    let mut rig = Rig::new();
    let left = rig.add(SubsystemId::ROOT, "left");
    let right = rig.add(SubsystemId::ROOT, "right");
    let lift = rig.add(SubsystemId::ROOT, "lift");
    let journal = Journal::default();

    let children = vec![
        DispatchAction::new(&rig.ids, Drive::endless(&rig.ids, left, "left", 0.3, &journal).boxed()).boxed(),
        DispatchAction::new(&rig.ids, Drive::endless(&rig.ids, right, "right", 0.4, &journal).boxed()).boxed(),
        DispatchAction::new(&rig.ids, Drive::finishing(&rig.ids, lift, "lift", 2, &journal).boxed())
            .blocking(true)
            .boxed(),
    ];
    let mut sequence = SequenceAction::new(&rig.ids, SubsystemId::ROOT, children);

    sequence.start(&mut rig.ctx()).unwrap();

    // Both fire-and-forget handoffs landed before any run().
    assert!(rig.tree.is_busy(left));
    assert!(rig.tree.is_busy(right));
    assert!(rig.tree.is_busy(lift));
    assert_eq!(rig.power(left), 0.3);
    assert_eq!(rig.power(right), 0.4);
    assert_eq!(sequence.current_index(), 2);
    assert!(!sequence.is_done());
    assert_eq!(journal.take(), vec!["start:left", "start:right", "start:lift"]);

    // The blocking dispatch holds the sequence until `lift` finishes.
    rig.tick();
    sequence.run(&mut rig.ctx()).unwrap();
    assert!(!sequence.is_done());

    rig.tick();
    sequence.run(&mut rig.ctx()).unwrap();
    assert!(sequence.is_done());
    assert!(!rig.tree.is_busy(lift));
    assert!(rig.tree.is_busy(left));
}

#[test]
fn sequence_starts_every_child_once_in_order() {
    let mut rig = Rig::new();
    let arm = rig.add(SubsystemId::ROOT, "arm");
    let journal = Journal::default();

    let children = vec![
        Drive::finishing(&rig.ids, arm, "a", 1, &journal).boxed(),
        Drive::finishing(&rig.ids, arm, "b", 0, &journal).boxed(),
        Drive::finishing(&rig.ids, arm, "c", 2, &journal).boxed(),
    ];
    let sequence = SequenceAction::new(&rig.ids, arm, children).named("Stow");
    rig.tree.set_action(arm, sequence.boxed(), false, &rig.clock).unwrap();

    for _ in 0..5 {
        rig.tick();
    }

    let events = journal.take();
    assert_eq!(
        events,
        vec!["start:a", "run:a", "start:b", "start:c", "run:c", "run:c"]
    );
    assert!(!rig.tree.is_busy(arm));
}

#[test]
fn parallel_finishes_with_its_slowest_child() {
    let mut rig = Rig::new();
    let drive = rig.add(SubsystemId::ROOT, "drive");
    let journal = Journal::default();

    let mut group = ParallelAction::new(&rig.ids, drive, Vec::new());
    group.push(Drive::finishing(&rig.ids, drive, "fast", 1, &journal).boxed()).unwrap();
    group.push(Drive::finishing(&rig.ids, drive, "slow", 3, &journal).boxed()).unwrap();
    rig.tree.set_action(drive, group.boxed(), false, &rig.clock).unwrap();

    rig.tick();
    assert!(rig.tree.is_busy(drive));
    rig.tick();
    assert!(rig.tree.is_busy(drive));
    rig.tick();
    assert!(!rig.tree.is_busy(drive));

    assert_eq!(journal.count("run:fast"), 1);
    assert_eq!(journal.count("run:slow"), 3);
}

#[test]
fn cancelling_parallel_cancels_each_pending_child_once() {
    let mut rig = Rig::new();
    let drive = rig.add(SubsystemId::ROOT, "drive");
    let journal = Journal::default();

    let children = vec![
        Drive::finishing(&rig.ids, drive, "done", 0, &journal).boxed(),
        Drive::endless(&rig.ids, drive, "left", 0.5, &journal).boxed(),
        Drive::endless(&rig.ids, drive, "right", 0.5, &journal).boxed(),
    ];
    let mut group = ParallelAction::new(&rig.ids, drive, children);
    group.start(&mut rig.ctx()).unwrap();
    group.run(&mut rig.ctx()).unwrap();
    journal.take();

    group.cancel(&mut rig.ctx());
    group.cancel(&mut rig.ctx());

    assert!(group.is_done());
    assert_eq!(journal.take(), vec!["cancel:left", "cancel:right"]);
    assert_eq!(rig.power(drive), 0.0);
}

#[test]
fn cancelling_blocking_dispatch_frees_the_target() {
    let mut rig = Rig::new();
    let intake = rig.add(SubsystemId::ROOT, "intake");
    let journal = Journal::default();
    rig.tree
        .set_default_action(intake, Drive::endless(&rig.ids, intake, "hold", 0.1, &journal).boxed(), &rig.clock)
        .unwrap();
    rig.tick();
    assert_eq!(rig.power(intake), 0.1);

    let mut dispatch =
        DispatchAction::new(&rig.ids, Drive::endless(&rig.ids, intake, "suck", 0.9, &journal).boxed())
            .blocking(true);
    dispatch.start(&mut rig.ctx()).unwrap();
    assert!(rig.tree.is_busy(intake));
    assert_eq!(rig.power(intake), 0.9);

    dispatch.cancel(&mut rig.ctx());
    assert!(!rig.tree.is_busy(intake));
    assert_eq!(rig.power(intake), 0.0);

    // The default comes back on the next run.
    rig.tick();
    assert_eq!(rig.power(intake), 0.1);
}
