//! The context handed to every handler action.
//!
//! All runtime effects available inside a handler go through the context:
//! sends, raises, transitions, creations, timers, monitors, receives, and
//! nondeterministic choices. The context also enforces the control-flow
//! invariants: at most one raise/goto/push/pop/halt per handler invocation,
//! no send after such a call, and no transition inside an exit action.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::traits::{Actor, HandlerError, StateMachine};
use crate::event::{Event, EventKey};
use crate::group::EventGroup;
use crate::monitor::Monitor;
use crate::runtime::errors::RuntimeError;
use crate::runtime::options::{CreateOptions, SendOptions};
use crate::runtime::Runtime;
use crate::util::{ActorId, OperationId, TimerId};

/// Outstanding control-flow request recorded by a handler.
#[derive(Debug)]
pub(crate) enum Control {
    Raise(Box<dyn Event>),
    Goto(&'static str),
    Push(&'static str),
    Pop,
    Halt,
}

impl Control {
    fn describe(&self) -> &'static str {
        match self {
            Control::Raise(_) => "raise",
            Control::Goto(_) => "goto",
            Control::Push(_) => "push",
            Control::Pop => "pop",
            Control::Halt => "halt",
        }
    }
}

/// Handler-side view of an actor: identity, group, and runtime effects.
pub struct ActorContext {
    runtime: Runtime,
    id: ActorId,
    op: OperationId,
    group: Option<EventGroup>,
    creation_group: Option<EventGroup>,
    pending: Option<Control>,
    in_exit: bool,
    current_state: &'static str,
}

impl ActorContext {
    pub(crate) fn new(
        runtime: Runtime,
        id: ActorId,
        op: OperationId,
        creation_group: Option<EventGroup>,
    ) -> Self {
        Self {
            runtime,
            id,
            op,
            group: creation_group.clone(),
            creation_group,
            pending: None,
            in_exit: false,
            current_state: "",
        }
    }

    /// This actor's id.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// The scheduler operation backing this actor.
    pub fn operation(&self) -> OperationId {
        self.op
    }

    /// Name of the state currently on top of the stack.
    pub fn current_state(&self) -> &'static str {
        self.current_state
    }

    /// The event group observed by the running handler.
    pub fn current_group(&self) -> Option<&EventGroup> {
        self.group.as_ref()
    }

    /// Replace the current group for the rest of this handler chain.
    pub fn set_group(&mut self, group: Option<EventGroup>) {
        self.group = group;
    }

    /// The runtime handle, for spawning controlled tasks from handlers.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    // --- sends -----------------------------------------------------------

    /// Enqueue an event at the target, propagating the current group, then
    /// hit a scheduling point.
    pub async fn send_event(&mut self, target: &ActorId, event: impl Event) {
        self.send_event_with(target, event, SendOptions::new()).await;
    }

    /// Enqueue an event with explicit group and instance-bound options.
    pub async fn send_event_with(
        &mut self,
        target: &ActorId,
        event: impl Event,
        options: SendOptions,
    ) {
        if let Some(pending) = &self.pending {
            let kind = pending.describe();
            tracing::debug!(actor = %self.id, kind, "send after transition");
            self.runtime
                .fail_now(RuntimeError::SendAfterTransition {
                    actor: self.id.to_string(),
                })
                .await;
            return;
        }
        let group = options.group.resolve(self.group.as_ref());
        self.runtime
            .post_event(
                Some(self.id.clone()),
                target,
                Box::new(event),
                group,
                options.max_instances,
            )
            .await;
    }

    /// Send and then drive until the target's inbox drains or the target
    /// blocks. Returns whether the target handled the event (it was not
    /// dropped at a halted actor).
    pub async fn send_event_and_execute(&mut self, target: &ActorId, event: impl Event) -> bool {
        if self.pending.is_some() {
            self.runtime
                .fail_now(RuntimeError::SendAfterTransition {
                    actor: self.id.to_string(),
                })
                .await;
            return false;
        }
        let group = self.group.clone();
        self.runtime
            .send_and_execute(Some(self.id.clone()), target, Box::new(event), group)
            .await
    }

    // --- control flow ----------------------------------------------------

    /// Raise an event against this actor's own state stack; it is handled
    /// ahead of the inbox, right after the current handler returns.
    pub async fn raise_event(&mut self, event: impl Event) {
        self.request(Control::Raise(Box::new(event))).await;
    }

    /// Exit the current state and enter `state` after the handler returns.
    pub async fn goto_state(&mut self, state: &'static str) {
        self.request(Control::Goto(state)).await;
    }

    /// Push `state` on the stack (no exit) after the handler returns.
    pub async fn push_state(&mut self, state: &'static str) {
        self.request(Control::Push(state)).await;
    }

    /// Exit and pop the current state after the handler returns; popping
    /// the last state halts the actor.
    pub async fn pop_state(&mut self) {
        self.request(Control::Pop).await;
    }

    /// Halt this actor after the handler returns.
    pub async fn halt(&mut self) {
        self.request(Control::Halt).await;
    }

    async fn request(&mut self, control: Control) {
        if self.in_exit {
            self.runtime
                .fail_now(RuntimeError::TransitionInOnExit {
                    actor: self.id.to_string(),
                })
                .await;
            return;
        }
        if self.pending.is_some() {
            self.runtime
                .fail_now(RuntimeError::MultipleTransitions {
                    actor: self.id.to_string(),
                })
                .await;
            return;
        }
        self.pending = Some(control);
    }

    // --- creation --------------------------------------------------------

    /// Create a uniform actor, inheriting the current group.
    pub async fn create_actor<A: Actor>(&mut self, actor: A) -> ActorId {
        self.create_actor_with(actor, CreateOptions::new()).await
    }

    pub async fn create_actor_with<A: Actor>(
        &mut self,
        actor: A,
        options: CreateOptions,
    ) -> ActorId {
        self.runtime
            .create_uniform_with_inherited(actor, options, self.group.clone())
            .await
    }

    /// Create a state machine, inheriting the current group.
    pub async fn create_machine<M: StateMachine>(&mut self, machine: M) -> ActorId {
        self.create_machine_with(machine, CreateOptions::new()).await
    }

    pub async fn create_machine_with<M: StateMachine>(
        &mut self,
        machine: M,
        options: CreateOptions,
    ) -> ActorId {
        self.runtime
            .create_machine_with_inherited(machine, options, self.group.clone())
            .await
    }

    // --- receive ---------------------------------------------------------

    /// Wait for the next inbox event of type `E`, bypassing dispatch.
    pub async fn receive<E: Event>(&mut self) -> Result<E, HandlerError> {
        let envelope = self
            .runtime
            .receive_event(&self.id, vec![EventKey::of::<E>()], vec![event_name::<E>()])
            .await;
        envelope
            .event
            .downcast::<E>()
            .map(|boxed| *boxed)
            .ok_or_else(|| HandlerError::new("received event of unexpected type"))
    }

    /// Wait for the next inbox event matching any of the given types.
    pub async fn receive_one_of(&mut self, keys: Vec<EventKey>, names: Vec<&'static str>) -> Box<dyn Event> {
        self.runtime.receive_event(&self.id, keys, names).await.event
    }

    // --- monitors, assertions, randomness --------------------------------

    /// Deliver an event to a registered specification monitor. Synchronous:
    /// the monitor runs to quiescence before this returns.
    pub async fn invoke_monitor<M: Monitor>(&self, event: impl Event) {
        self.runtime.invoke_monitor::<M>(event).await;
    }

    /// Fail the iteration with `AssertionFailure` when `condition` is false.
    pub async fn assert(&self, condition: bool, message: impl Into<String>) {
        self.runtime.assert_that(condition, message).await;
    }

    /// A nondeterministic boolean chosen by the strategy.
    pub async fn random_boolean(&self) -> bool {
        self.runtime.random_boolean().await
    }

    /// A nondeterministic boolean chosen by the fair selector.
    pub async fn fair_random_boolean(&self) -> bool {
        self.runtime.fair_random_boolean().await
    }

    /// A nondeterministic integer in `[0, max_exclusive)`.
    pub async fn random_integer(&self, max_exclusive: u32) -> u32 {
        self.runtime.random_integer(max_exclusive).await
    }

    // --- timers ----------------------------------------------------------

    /// Start a one-shot timer owned by this actor. Under controlled
    /// execution the firing instant is a scheduling choice.
    pub async fn start_timer(&mut self, due: Duration) -> TimerId {
        self.runtime.start_timer(&self.id, due, None).await
    }

    /// Start a periodic timer owned by this actor.
    pub async fn start_periodic_timer(&mut self, due: Duration, period: Duration) -> TimerId {
        self.runtime.start_timer(&self.id, due, Some(period)).await
    }

    /// Stop a timer; already-queued elapsed events stay in the inbox.
    pub fn stop_timer(&mut self, timer: TimerId) {
        self.runtime.stop_timer(&self.id, timer);
    }

    // --- host-side plumbing ----------------------------------------------

    pub(crate) fn take_pending(&mut self) -> Option<Control> {
        self.pending.take()
    }

    pub(crate) fn enter_exit_scope(&mut self) {
        self.in_exit = true;
    }

    pub(crate) fn leave_exit_scope(&mut self) {
        self.in_exit = false;
    }

    pub(crate) fn set_current_state(&mut self, state: &'static str) {
        self.current_state = state;
    }

    pub(crate) fn swap_group(&mut self, group: Option<EventGroup>) -> Option<EventGroup> {
        std::mem::replace(&mut self.group, group)
    }

    pub(crate) fn restore_group(&mut self, group: Option<EventGroup>) {
        self.group = group;
    }

    pub(crate) fn creation_group(&self) -> Option<&EventGroup> {
        self.creation_group.as_ref()
    }
}

fn event_name<E: Event>() -> &'static str {
    crate::util::short_type_name(std::any::type_name::<E>())
}
