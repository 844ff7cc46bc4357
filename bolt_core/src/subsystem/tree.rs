//! Subsystem arena and action-slot arbitration.
//!
//! Each node's action slot is the single shared mutable resource contended
//! by the teleop controller, the autonomous controller and the default-action
//! fallback. Only [`SubsystemTree::set_action`] and
//! [`SubsystemTree::cancel_action`] mutate it.
//!
//! ## Slot states
//!
//! ```text
//!            set_action                      run(): done
//!   Idle ───────────────► RunningNonDefault ───────────────► Idle
//!    ▲ │                        │ cancel_action                │
//!    │ │ run(): slot empty,     ▼                              │ run(): default
//!    │ │ default present   RunningDefault ◄────────────────────┘ not just finished
//!    │ └──────────────────────► │
//!    └──── run(): default done ─┘  (not restarted in the same tick)
//! ```
//!
//! ## Re-entrancy
//!
//! While an action executes it is checked out of its slot and the slot is
//! marked `Executing`. `set_action`/`cancel_action` calls that would replace
//! or cancel an executing slot (the action's own subsystem or an ancestor
//! whose cascade reaches it) are rejected with [`Rejection::Executing`].
//!
//! ## Ordering
//!
//! `compute_state` and `run` walk the tree top-down: a parent always
//! finishes before its children, and siblings go in insertion order.

use std::any::type_name;
use std::mem;

use bolt_common::consts::{MAX_CHILDREN, MAX_NAME_LEN, MAX_SUBSYSTEMS};
use tracing::{debug, warn};

use super::{Mechanism, SubsystemId};
use crate::action::{ActionContext, ActionId, BoxedAction};
use crate::clock::Clock;
use crate::error::{ActionError, Rejection, TreeError};

type Name = heapless::String<MAX_NAME_LEN>;
type Children = heapless::Vec<SubsystemId, MAX_CHILDREN>;

/// What currently occupies a subsystem's action slot.
enum Slot {
    Empty,
    /// A non-default action (possibly already done, cleared on next `run`).
    Action(BoxedAction),
    /// The node's default action is current; it stays in `Node::default`.
    Default,
    /// The current action is checked out and executing further up the stack.
    Executing { default: bool, id: ActionId },
}

/// Externally visible arbitration state of one subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    RunningNonDefault,
    RunningDefault,
}

struct Node {
    name: Name,
    parent: Option<SubsystemId>,
    children: Children,
    slot: Slot,
    default: Option<BoxedAction>,
    /// Set when the default completed this tick; suppresses one restart.
    finished_default: bool,
    /// The default's last start failed; repeats are logged at debug.
    default_failing: bool,
    mechanism: Box<dyn Mechanism>,
}

impl Node {
    fn new(
        name: &str,
        parent: Option<SubsystemId>,
        mechanism: Box<dyn Mechanism>,
    ) -> Result<Self, TreeError> {
        let mut label = Name::new();
        label
            .push_str(name)
            .map_err(|_| TreeError::NameTooLong(name.to_string()))?;
        Ok(Self {
            name: label,
            parent,
            children: Children::new(),
            slot: Slot::Empty,
            default: None,
            finished_default: false,
            default_failing: false,
            mechanism,
        })
    }

    /// Holds a non-default action that is not done.
    fn is_busy(&self) -> bool {
        match &self.slot {
            Slot::Action(action) => !action.is_done(),
            Slot::Executing { default, .. } => !default,
            Slot::Empty | Slot::Default => false,
        }
    }

    fn default_id(&self) -> Option<ActionId> {
        match (&self.default, &self.slot) {
            (Some(action), _) => Some(action.id()),
            (None, Slot::Executing { default: true, id }) => Some(*id),
            _ => None,
        }
    }
}

/// Arena of subsystems rooted at [`SubsystemId::ROOT`].
pub struct SubsystemTree {
    nodes: Vec<Node>,
}

impl SubsystemTree {
    /// Create a tree holding only the root subsystem.
    pub fn new<M: Mechanism>(root_name: &str, mechanism: M) -> Result<Self, TreeError> {
        let mut nodes = Vec::with_capacity(MAX_SUBSYSTEMS);
        nodes.push(Node::new(root_name, None, Box::new(mechanism))?);
        Ok(Self { nodes })
    }

    /// Attach a new subsystem under `parent`.
    pub fn add_subsystem<M: Mechanism>(
        &mut self,
        parent: SubsystemId,
        name: &str,
        mechanism: M,
    ) -> Result<SubsystemId, TreeError> {
        if parent.index() >= self.nodes.len() {
            return Err(TreeError::UnknownSubsystem(parent));
        }
        if self.nodes.len() >= MAX_SUBSYSTEMS {
            return Err(TreeError::TooManySubsystems);
        }
        let id = SubsystemId::from_index(self.nodes.len());
        let node = Node::new(name, Some(parent), Box::new(mechanism))?;
        self.nodes[parent.index()]
            .children
            .push(id)
            .map_err(|_| TreeError::TooManyChildren(parent))?;
        self.nodes.push(node);
        Ok(id)
    }

    // ─── Structure ──────────────────────────────────────────────────

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: SubsystemId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn name(&self, id: SubsystemId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    pub fn parent(&self, id: SubsystemId) -> Option<SubsystemId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: SubsystemId) -> &[SubsystemId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Look a subsystem up by name.
    pub fn find(&self, name: &str) -> Option<SubsystemId> {
        self.nodes
            .iter()
            .position(|n| n.name.as_str() == name)
            .map(SubsystemId::from_index)
    }

    fn node(&self, id: SubsystemId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn label(&self, id: SubsystemId) -> &str {
        self.name(id).unwrap_or("?")
    }

    // ─── Mechanisms ─────────────────────────────────────────────────

    /// Borrow a subsystem's mechanism as its concrete type.
    pub fn mechanism<M: Mechanism>(&self, id: SubsystemId) -> Result<&M, ActionError> {
        let node = self.node(id).ok_or(ActionError::UnknownSubsystem(id))?;
        node.mechanism
            .as_any()
            .downcast_ref::<M>()
            .ok_or(ActionError::MechanismMismatch {
                subsystem: id,
                expected: short_type_name::<M>(),
            })
    }

    pub fn mechanism_mut<M: Mechanism>(&mut self, id: SubsystemId) -> Result<&mut M, ActionError> {
        let node = self
            .nodes
            .get_mut(id.index())
            .ok_or(ActionError::UnknownSubsystem(id))?;
        node.mechanism
            .as_any_mut()
            .downcast_mut::<M>()
            .ok_or(ActionError::MechanismMismatch {
                subsystem: id,
                expected: short_type_name::<M>(),
            })
    }

    /// Zero every actuator output of one subsystem.
    pub fn stop_mechanism(&mut self, id: SubsystemId) {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.mechanism.stop();
        }
    }

    // ─── Busy predicates ────────────────────────────────────────────

    /// Holds a non-default action that is not done.
    pub fn is_busy(&self, id: SubsystemId) -> bool {
        self.node(id).is_some_and(Node::is_busy)
    }

    /// This subsystem or any ancestor is busy.
    pub fn is_any_parent_busy(&self, id: SubsystemId) -> bool {
        self.first_busy_upwards(Some(id)).is_some()
    }

    /// This subsystem or any descendant is busy.
    pub fn is_busy_or_child_busy(&self, id: SubsystemId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        node.is_busy()
            || node
                .children
                .iter()
                .any(|child| self.is_busy_or_child_busy(*child))
    }

    fn first_busy_upwards(&self, mut cursor: Option<SubsystemId>) -> Option<SubsystemId> {
        while let Some(id) = cursor {
            let node = self.node(id)?;
            if node.is_busy() {
                return Some(id);
            }
            cursor = node.parent;
        }
        None
    }

    fn executing_in_subtree(&self, id: SubsystemId) -> Option<SubsystemId> {
        let node = self.node(id)?;
        if matches!(node.slot, Slot::Executing { .. }) {
            return Some(id);
        }
        node.children
            .iter()
            .find_map(|child| self.executing_in_subtree(*child))
    }

    // ─── Slot inspection ────────────────────────────────────────────

    pub fn slot_state(&self, id: SubsystemId) -> SlotState {
        match self.node(id).map(|n| &n.slot) {
            Some(Slot::Action(_)) | Some(Slot::Executing { default: false, .. }) => {
                SlotState::RunningNonDefault
            }
            Some(Slot::Default) | Some(Slot::Executing { default: true, .. }) => {
                SlotState::RunningDefault
            }
            Some(Slot::Empty) | None => SlotState::Idle,
        }
    }

    /// Id of whatever occupies the slot, default included.
    pub fn current_action_id(&self, id: SubsystemId) -> Option<ActionId> {
        let node = self.node(id)?;
        match &node.slot {
            Slot::Empty => None,
            Slot::Action(action) => Some(action.id()),
            Slot::Default => node.default.as_ref().map(|d| d.id()),
            Slot::Executing { id, .. } => Some(*id),
        }
    }

    pub fn default_action_id(&self, id: SubsystemId) -> Option<ActionId> {
        self.node(id).and_then(Node::default_id)
    }

    /// The action `action_id` is still installed on `id` and not done.
    pub fn is_action_active(&self, id: SubsystemId, action_id: ActionId) -> bool {
        self.node(id).is_some_and(|node| match &node.slot {
            Slot::Action(action) => action.id() == action_id && !action.is_done(),
            Slot::Executing { default: false, id } => *id == action_id,
            _ => false,
        })
    }

    // ─── Arbitration ────────────────────────────────────────────────

    /// Install `action` as the subsystem's current action and start it.
    ///
    /// Rejected, with no state change, when `action` is the subsystem's
    /// default, when `parent_busy_ok` is false and an ancestor is busy, or
    /// when the call would preempt an executing action. Otherwise the
    /// current action and every descendant's action are cancelled (defaults
    /// are not restarted mid-cancel) before `action.start()`. A failing start
    /// is logged and leaves the slot empty.
    pub fn set_action(
        &mut self,
        id: SubsystemId,
        action: BoxedAction,
        parent_busy_ok: bool,
        clock: &Clock,
    ) -> Result<(), Rejection> {
        let node = self.node(id).ok_or(Rejection::UnknownSubsystem(id))?;

        if node.default_id() == Some(action.id()) {
            debug!(subsystem = self.label(id), action = action.name(), "rejected: default action");
            return Err(Rejection::DefaultAction);
        }

        if !parent_busy_ok {
            if let Some(ancestor) = self.first_busy_upwards(node.parent) {
                debug!(
                    subsystem = self.label(id),
                    action = action.name(),
                    ancestor = self.label(ancestor),
                    "rejected: ancestor busy"
                );
                return Err(Rejection::AncestorBusy { ancestor });
            }
        }

        if let Some(executing) = self.executing_in_subtree(id) {
            debug!(
                subsystem = self.label(id),
                action = action.name(),
                executing = self.label(executing),
                "rejected: slot executing"
            );
            return Err(Rejection::Executing(executing));
        }

        self.cancel_subtree(id, clock);
        debug!(
            subsystem = self.label(id),
            action = action.name(),
            action_id = %action.id(),
            "installing action"
        );
        self.start_in_slot(id, action, false, clock);
        Ok(())
    }

    /// Cancel whatever is current.
    ///
    /// A cancelled non-default action falls back to the default action (if
    /// any), which is started immediately; a cancelled default leaves the
    /// slot empty until the next `run`.
    pub fn cancel_action(&mut self, id: SubsystemId, clock: &Clock) -> Result<(), Rejection> {
        let node = self.node(id).ok_or(Rejection::UnknownSubsystem(id))?;
        let was_default = matches!(node.slot, Slot::Default);
        let has_default = node.default.is_some();

        if let Some(executing) = self.executing_in_subtree(id) {
            return Err(Rejection::Executing(executing));
        }

        self.cancel_slot(id, clock);
        if has_default && !was_default {
            self.install_default(id, clock);
        }
        Ok(())
    }

    /// Cancel and clear the slot only if it still holds `action_id`.
    pub fn cancel_if_current(&mut self, id: SubsystemId, action_id: ActionId, clock: &Clock) -> bool {
        let holds = self
            .node(id)
            .is_some_and(|n| matches!(&n.slot, Slot::Action(a) if a.id() == action_id));
        if holds {
            self.cancel_slot(id, clock);
        }
        holds
    }

    /// Replace the subsystem's default action.
    ///
    /// A running default is cancelled; the new one starts on the next `run`
    /// if nothing else is current.
    pub fn set_default_action(
        &mut self,
        id: SubsystemId,
        action: BoxedAction,
        clock: &Clock,
    ) -> Result<(), Rejection> {
        let node = self.node(id).ok_or(Rejection::UnknownSubsystem(id))?;
        if matches!(node.slot, Slot::Executing { default: true, .. }) {
            return Err(Rejection::Executing(id));
        }
        if matches!(node.slot, Slot::Default) {
            self.cancel_slot(id, clock);
        }
        debug!(subsystem = self.label(id), action = action.name(), "default action set");
        let node = &mut self.nodes[id.index()];
        node.default = Some(action);
        node.finished_default = false;
        node.default_failing = false;
        Ok(())
    }

    /// Remove the subsystem's default action, cancelling it if running.
    pub fn clear_default_action(
        &mut self,
        id: SubsystemId,
        clock: &Clock,
    ) -> Result<Option<BoxedAction>, Rejection> {
        let node = self.node(id).ok_or(Rejection::UnknownSubsystem(id))?;
        if matches!(node.slot, Slot::Executing { default: true, .. }) {
            return Err(Rejection::Executing(id));
        }
        if matches!(node.slot, Slot::Default) {
            self.cancel_slot(id, clock);
        }
        Ok(self.nodes[id.index()].default.take())
    }

    // ─── Per-tick entry points ──────────────────────────────────────

    /// Sample every mechanism, parents before children.
    pub fn compute_state(&mut self, clock: &Clock) {
        self.compute_node(SubsystemId::ROOT, clock);
    }

    /// Advance every subsystem's action one step, parents before children.
    pub fn run(&mut self, clock: &Clock) {
        self.run_node(SubsystemId::ROOT, clock);
    }

    /// Cancel every action and zero every output (fail-safe stop).
    pub fn shutdown(&mut self, clock: &Clock) {
        self.cancel_subtree(SubsystemId::ROOT, clock);
        for node in &mut self.nodes {
            node.mechanism.stop();
        }
        debug!("all subsystems stopped");
    }

    fn compute_node(&mut self, id: SubsystemId, clock: &Clock) {
        self.nodes[id.index()].mechanism.compute_state(clock);
        let children = self.nodes[id.index()].children.clone();
        for child in children {
            self.compute_node(child, clock);
        }
    }

    fn run_node(&mut self, id: SubsystemId, clock: &Clock) {
        let i = id.index();

        if let Some((mut action, is_default)) = self.check_out(id) {
            let outcome = if action.is_done() {
                Ok(())
            } else {
                let mut ctx = ActionContext::new(self, clock);
                action.run(&mut ctx)
            };

            match outcome {
                Ok(()) if action.is_done() => {
                    if is_default {
                        debug!(subsystem = self.label(id), action = action.name(), "default action finished");
                        self.nodes[i].finished_default = true;
                        self.nodes[i].default = Some(action);
                    } else {
                        debug!(
                            subsystem = self.label(id),
                            action = action.name(),
                            action_id = %action.id(),
                            "action complete"
                        );
                    }
                    self.nodes[i].slot = Slot::Empty;
                }
                Ok(()) => self.check_in(id, action, is_default),
                Err(err) => {
                    warn!(
                        subsystem = self.label(id),
                        action = action.name(),
                        action_id = %action.id(),
                        error = %err,
                        "action failed, deactivating"
                    );
                    {
                        let mut ctx = ActionContext::new(self, clock);
                        action.cancel(&mut ctx);
                    }
                    if is_default {
                        self.nodes[i].finished_default = true;
                        self.nodes[i].default = Some(action);
                    }
                    self.nodes[i].slot = Slot::Empty;
                }
            }
        }

        let node = &mut self.nodes[i];
        if matches!(node.slot, Slot::Empty) && node.default.is_some() {
            if node.finished_default {
                node.finished_default = false;
            } else {
                self.install_default(id, clock);
            }
        }

        let children = self.nodes[i].children.clone();
        for child in children {
            self.run_node(child, clock);
        }
    }

    // ─── Slot plumbing ──────────────────────────────────────────────

    fn check_out(&mut self, id: SubsystemId) -> Option<(BoxedAction, bool)> {
        let node = &mut self.nodes[id.index()];
        match mem::replace(&mut node.slot, Slot::Empty) {
            Slot::Action(action) => {
                node.slot = Slot::Executing {
                    default: false,
                    id: action.id(),
                };
                Some((action, false))
            }
            Slot::Default => {
                let action = node.default.take()?;
                node.slot = Slot::Executing {
                    default: true,
                    id: action.id(),
                };
                Some((action, true))
            }
            other => {
                node.slot = other;
                None
            }
        }
    }

    fn check_in(&mut self, id: SubsystemId, action: BoxedAction, is_default: bool) {
        let node = &mut self.nodes[id.index()];
        if is_default {
            node.default = Some(action);
            node.slot = Slot::Default;
        } else {
            node.slot = Slot::Action(action);
        }
    }

    fn start_in_slot(&mut self, id: SubsystemId, mut action: BoxedAction, is_default: bool, clock: &Clock) {
        let i = id.index();
        self.nodes[i].slot = Slot::Executing {
            default: is_default,
            id: action.id(),
        };
        self.nodes[i].finished_default = false;

        let result = {
            let mut ctx = ActionContext::new(self, clock);
            action.start(&mut ctx)
        };

        let slot = match result {
            Ok(()) if is_default => {
                self.nodes[i].default = Some(action);
                self.nodes[i].default_failing = false;
                Slot::Default
            }
            Ok(()) => Slot::Action(action),
            Err(err) => {
                if is_default && self.nodes[i].default_failing {
                    debug!(
                        subsystem = self.label(id),
                        action = action.name(),
                        error = %err,
                        "default action failed to start again"
                    );
                } else {
                    warn!(
                        subsystem = self.label(id),
                        action = action.name(),
                        action_id = %action.id(),
                        error = %err,
                        "action failed to start, slot cleared"
                    );
                }
                {
                    let mut ctx = ActionContext::new(self, clock);
                    action.cancel(&mut ctx);
                }
                if is_default {
                    // Retried after sitting out one run, like a finished default.
                    let node = &mut self.nodes[i];
                    node.default = Some(action);
                    node.finished_default = true;
                    node.default_failing = true;
                }
                Slot::Empty
            }
        };
        self.nodes[i].slot = slot;
    }

    fn install_default(&mut self, id: SubsystemId, clock: &Clock) {
        let children = self.nodes[id.index()].children.clone();
        for child in children {
            self.cancel_subtree(child, clock);
        }
        let Some(action) = self.nodes[id.index()].default.take() else {
            return;
        };
        debug!(subsystem = self.label(id), action = action.name(), "starting default action");
        self.start_in_slot(id, action, true, clock);
    }

    fn cancel_subtree(&mut self, id: SubsystemId, clock: &Clock) {
        self.cancel_slot(id, clock);
        let children = self.nodes[id.index()].children.clone();
        for child in children {
            self.cancel_subtree(child, clock);
        }
    }

    /// Cancel and clear one slot without touching the default fallback.
    fn cancel_slot(&mut self, id: SubsystemId, clock: &Clock) {
        let i = id.index();
        match mem::replace(&mut self.nodes[i].slot, Slot::Empty) {
            Slot::Action(mut action) => {
                let mut ctx = ActionContext::new(self, clock);
                action.cancel(&mut ctx);
            }
            Slot::Default => {
                if let Some(mut action) = self.nodes[i].default.take() {
                    {
                        let mut ctx = ActionContext::new(self, clock);
                        action.cancel(&mut ctx);
                    }
                    self.nodes[i].default = Some(action);
                }
            }
            executing @ Slot::Executing { .. } => self.nodes[i].slot = executing,
            Slot::Empty => {}
        }
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

// ─── Tests ──────────────────────────────────────────────────────────
