//! The per-actor event loop: dequeue, dispatch, transition.
//!
//! One host runs per live actor, as the body of that actor's operation.
//! The host owns the behavior instance and its state stack; everything the
//! rest of the runtime sees (inbox, stack mirror, user hash) goes through
//! the actor record. Handler outcomes are explicit values, never unwinding:
//! the context records at most one control-flow request per handler
//! invocation and the host interprets it here.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use super::context::{ActorContext, Control};
use super::inbox::{FetchDecision, Inbox};
use super::table::{ActionId, Handle, MachineTable, Resolution};
use super::traits::{Behavior, ExceptionOutcome};
use crate::event::{DefaultEvent, Event, EventEnvelope, EventKey, HaltEvent};
use crate::runtime::errors::RuntimeError;
use crate::runtime::Runtime;
use crate::scheduler::{OperationSignal, WaitReason};
use crate::util::{ActorId, OperationId};

pub(crate) struct ActorHost {
    runtime: Runtime,
    id: ActorId,
    signal: Arc<OperationSignal>,
    behavior: Box<dyn Behavior>,
    table: MachineTable,
    stack: Vec<&'static str>,
    inbox: Arc<Inbox>,
    ctx: ActorContext,
    halted: bool,
}

impl ActorHost {
    pub(crate) fn new(
        runtime: Runtime,
        id: ActorId,
        op: OperationId,
        signal: Arc<OperationSignal>,
        behavior: Box<dyn Behavior>,
        table: MachineTable,
        inbox: Arc<Inbox>,
        creation_group: Option<crate::group::EventGroup>,
    ) -> Self {
        let ctx = ActorContext::new(runtime.clone(), id.clone(), op, creation_group);
        Self {
            runtime,
            id,
            signal,
            behavior,
            table,
            stack: Vec::new(),
            inbox,
            ctx,
            halted: false,
        }
    }

    /// The operation body: wait for the creation grant, run the start
    /// state's entry, then loop on the inbox until halted.
    pub(crate) async fn run(mut self) {
        self.signal.acquired().await;
        self.runtime.actor_initializing(&self.id);

        let start = self.table.start_state();
        self.enter_state(start, None).await;
        self.process_pending(None).await;
        self.runtime.actor_running(&self.id);

        while !self.halted {
            match self.next_envelope() {
                Some((envelope, resolution)) => {
                    self.runtime
                        .schedule_point(Some(format!("{}<-{}", self.id, envelope.event_name())))
                        .await;
                    self.dispatch(envelope, resolution).await;
                }
                None => {
                    if self.table.has_default_handler(&self.stack) {
                        let envelope = EventEnvelope::new(Box::new(DefaultEvent));
                        let resolution = self.table.resolve(&self.stack, envelope.key());
                        self.runtime
                            .schedule_point(Some(format!("{}<-DefaultEvent", self.id)))
                            .await;
                        self.dispatch(envelope, resolution).await;
                    } else {
                        self.runtime.suspend(WaitReason::Dequeue).await;
                    }
                }
            }
        }

        self.finalize().await;
    }

    /// Scan the inbox under the current dispatch masks. Halt events always
    /// dequeue; events with no handler dequeue too, so the unhandled-event
    /// check fires in original arrival order.
    fn next_envelope(&self) -> Option<(EventEnvelope, Option<Resolution>)> {
        let mut matched: Option<Option<Resolution>> = None;
        let envelope = self.inbox.dequeue_where(|candidate| {
            if candidate.key() == EventKey::of::<HaltEvent>() {
                matched = Some(None);
                return FetchDecision::Take;
            }
            match self.table.resolve(&self.stack, candidate.key()) {
                Some(Resolution {
                    handle: Handle::Ignore,
                    ..
                }) => FetchDecision::Discard,
                Some(Resolution {
                    handle: Handle::Defer,
                    ..
                }) => FetchDecision::Skip,
                resolution => {
                    matched = Some(resolution);
                    FetchDecision::Take
                }
            }
        })?;
        Some((envelope, matched.flatten()))
    }

    /// Dispatch one dequeued event against the state stack.
    async fn dispatch(&mut self, envelope: EventEnvelope, resolution: Option<Resolution>) {
        // The group observed during the handler is the dequeued event's
        // group, or the creation-inherited group when it carried none.
        let effective = envelope
            .group
            .clone()
            .or_else(|| self.ctx.creation_group().cloned());
        let previous_group = self.ctx.swap_group(effective);

        self.runtime
            .coverage_event_received(&self.id, self.top_state(), envelope.event_name());

        if envelope.key() == EventKey::of::<HaltEvent>() {
            debug!(actor = %self.id, "halt event dequeued");
            self.halted = true;
            self.ctx.restore_group(previous_group);
            return;
        }

        match resolution {
            None => {
                self.runtime
                    .fail_now(RuntimeError::UnhandledEvent {
                        actor: self.id.to_string(),
                        event: envelope.event_name().to_string(),
                    })
                    .await;
            }
            Some(resolution) => {
                let event = envelope.event;
                match resolution.handle {
                    Handle::Action(action) => {
                        self.run_action(action, Some(&*event)).await;
                        self.process_pending(Some(event)).await;
                    }
                    Handle::Goto(target) => {
                        self.goto(target, Some(&*event)).await;
                        self.process_pending(Some(event)).await;
                    }
                    Handle::Push(target) => {
                        self.push(target, Some(&*event)).await;
                        self.process_pending(Some(event)).await;
                    }
                    // The inbox scan consumed or skipped these already.
                    Handle::Ignore | Handle::Defer => {}
                }
            }
        }

        self.ctx.restore_group(previous_group);
    }

    /// Interpret control-flow requests recorded by handlers, including the
    /// chains started by entry actions. Raised events are processed ahead
    /// of the inbox, against the current stack.
    async fn process_pending(&mut self, mut current_event: Option<Box<dyn Event>>) {
        while !self.halted {
            let Some(control) = self.ctx.take_pending() else {
                break;
            };
            match control {
                Control::Raise(event) => {
                    self.runtime
                        .schedule_point(Some(format!("{}^{}", self.id, event.name())))
                        .await;
                    if event.key() == EventKey::of::<HaltEvent>() {
                        debug!(actor = %self.id, "halt raised");
                        self.halted = true;
                        continue;
                    }
                    match self.table.resolve(&self.stack, event.key()) {
                        Some(Resolution {
                            handle: Handle::Ignore,
                            ..
                        }) => {
                            trace!(actor = %self.id, event = event.name(), "raised event ignored");
                        }
                        Some(Resolution {
                            handle: Handle::Action(action),
                            ..
                        }) => {
                            self.run_action(action, Some(&*event)).await;
                            current_event = Some(event);
                        }
                        Some(Resolution {
                            handle: Handle::Goto(target),
                            ..
                        }) => {
                            self.goto(target, Some(&*event)).await;
                            current_event = Some(event);
                        }
                        Some(Resolution {
                            handle: Handle::Push(target),
                            ..
                        }) => {
                            self.push(target, Some(&*event)).await;
                            current_event = Some(event);
                        }
                        // A deferred raised event has no queue to wait in.
                        Some(Resolution {
                            handle: Handle::Defer,
                            ..
                        })
                        | None => {
                            self.runtime
                                .fail_now(RuntimeError::UnhandledEvent {
                                    actor: self.id.to_string(),
                                    event: event.name().to_string(),
                                })
                                .await;
                        }
                    }
                }
                Control::Goto(target) => {
                    self.runtime
                        .schedule_point(Some(format!("{}->{target}", self.id)))
                        .await;
                    self.goto(target, current_event.as_deref()).await;
                }
                Control::Push(target) => {
                    self.runtime
                        .schedule_point(Some(format!("{}->{target}", self.id)))
                        .await;
                    self.push(target, current_event.as_deref()).await;
                }
                Control::Pop => {
                    self.runtime
                        .schedule_point(Some(format!("{}->pop", self.id)))
                        .await;
                    self.exit_top_state().await;
                    self.stack.pop();
                    self.sync_stack();
                    if self.stack.is_empty() {
                        self.halted = true;
                    } else {
                        self.ctx.set_current_state(self.top_state());
                    }
                }
                Control::Halt => {
                    self.halted = true;
                }
            }
        }
    }

    async fn goto(&mut self, target: &'static str, event: Option<&dyn Event>) {
        if !self.ensure_declared(target).await {
            return;
        }
        let from = self.top_state();
        self.exit_top_state().await;
        self.stack.pop();
        self.runtime.coverage_transition(
            &self.id,
            from,
            event.map(Event::name).unwrap_or("entry"),
            target,
        );
        self.enter_state(target, event).await;
    }

    async fn push(&mut self, target: &'static str, event: Option<&dyn Event>) {
        if !self.ensure_declared(target).await {
            return;
        }
        let from = self.top_state();
        self.runtime.coverage_transition(
            &self.id,
            from,
            event.map(Event::name).unwrap_or("entry"),
            target,
        );
        self.enter_state(target, event).await;
    }

    async fn ensure_declared(&mut self, target: &'static str) -> bool {
        if self.table.has_state(target) {
            return true;
        }
        self.runtime
            .fail_now(RuntimeError::InvalidTransition {
                actor: self.id.to_string(),
                target: target.to_string(),
            })
            .await;
        false
    }

    async fn enter_state(&mut self, name: &'static str, event: Option<&dyn Event>) {
        self.stack.push(name);
        self.sync_stack();
        self.ctx.set_current_state(name);
        self.runtime.coverage_state_visited(&self.id, name);
        trace!(actor = %self.id, state = name, "state entered");

        let entry = self.table.state(name).and_then(|s| s.entry());
        if let Some(action) = entry {
            self.run_action(action, event).await;
        }
    }

    async fn exit_top_state(&mut self) {
        let exit = self
            .table
            .state(self.top_state())
            .and_then(|s| s.exit());
        if let Some(action) = exit {
            self.ctx.enter_exit_scope();
            self.run_action(action, None).await;
            self.ctx.leave_exit_scope();
        }
    }

    async fn run_action(&mut self, action: ActionId, event: Option<&dyn Event>) {
        let result = self.behavior.execute(action, event, &mut self.ctx).await;
        self.runtime
            .update_user_hash(&self.id, self.behavior.hashed_state());
        if let Err(error) = result {
            match self.behavior.on_exception(&error) {
                ExceptionOutcome::HandledException => {
                    warn!(actor = %self.id, %error, "handler failure contained, halting actor");
                    self.halted = true;
                }
                ExceptionOutcome::ThrowException => {
                    self.runtime
                        .fail_now(RuntimeError::HandlerFailure {
                            actor: self.id.to_string(),
                            message: error.message().to_string(),
                        })
                        .await;
                }
            }
        }
    }

    async fn finalize(&mut self) {
        debug!(actor = %self.id, "actor halting");
        if let Err(error) = self.behavior.on_halt(&mut self.ctx).await {
            warn!(actor = %self.id, %error, "on_halt hook failed");
        }
        self.runtime.actor_halted(&self.id);
        for envelope in self.inbox.drain() {
            self.runtime.notify_dropped(&self.id, &*envelope.event);
        }
        self.runtime.complete_current();
    }

    fn top_state(&self) -> &'static str {
        self.stack.last().copied().unwrap_or("")
    }

    fn sync_stack(&self) {
        self.runtime.update_stack_mirror(&self.id, self.stack.clone());
    }
}
