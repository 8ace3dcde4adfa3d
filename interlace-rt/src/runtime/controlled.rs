//! The controlled runtime handle.
//!
//! A `Runtime` is an explicit handle passed to every operation; there is no
//! ambient global state. The handle owns (through its shared inner) the
//! scheduler, the actor table, the monitor registry, the liveness checker,
//! and the per-iteration coverage collector. The actor table owns actor
//! records; actors reference each other by id only, and every outgoing
//! reference is a table lookup.

// Layer 1: Standard library imports
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::errors::RuntimeError;
use super::options::{CreateOptions, GroupChoice};
use crate::actor::host::ActorHost;
use crate::actor::inbox::Inbox;
use crate::actor::lifecycle::ActorStatus;
use crate::actor::traits::{Actor, Behavior, MachineBehavior, StateMachine, UniformBehavior};
use crate::coverage::CoverageCollector;
use crate::event::{Event, EventEnvelope, EventKey, TimerElapsedEvent, TimerInfo};
use crate::group::EventGroup;
use crate::monitor::registry::MonitorRegistry;
use crate::monitor::{LivenessChecker, Monitor};
use crate::scheduler::{
    OperationKind, OperationStatus, Scheduler, SharedStrategy, WaitReason,
};
use crate::task::cancellation::Cancellable;
use crate::task::handle::{TaskError, TaskHandle, TaskState};
use crate::task::CancellationToken;
use crate::util::{short_type_name, ActorId, OperationId, TimerId};

/// Diagnostics callbacks installed by the harness.
#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    pub on_failure: Option<Arc<dyn Fn(&RuntimeError) + Send + Sync>>,
    pub on_event_dropped: Option<Arc<dyn Fn(&ActorId, &dyn Event) + Send + Sync>>,
}

enum Binding {
    /// Id created (e.g. from a name) but not yet bound to an instance.
    Reserved,
    Live(LiveActor),
    Halted,
}

struct LiveActor {
    op: OperationId,
    inbox: Arc<Inbox>,
    status: ActorStatus,
    /// Mirror of the host's state stack, for hashing and diagnostics.
    stack: Vec<&'static str>,
    user_hash: u64,
    /// Event keys an in-progress explicit receive is waiting for.
    receive: Option<Vec<EventKey>>,
    timers: Vec<(TimerId, OperationId)>,
}

struct ActorRecord {
    type_name: String,
    binding: Binding,
}

pub(crate) struct RuntimeInner {
    instance: Uuid,
    scheduler: Scheduler,
    actors: Mutex<BTreeMap<u64, ActorRecord>>,
    /// (type name, friendly name) -> reserved or bound id.
    named_ids: Mutex<HashMap<(String, String), ActorId>>,
    next_actor_seq: AtomicU64,
    next_timer_seq: AtomicU64,
    next_resource: AtomicU64,
    monitors: MonitorRegistry,
    liveness: LivenessChecker,
    coverage: CoverageCollector,
    callbacks: Callbacks,
    user_hashing: bool,
}

/// Cheaply clonable handle to one controlled execution.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub(crate) fn new(
        strategy: SharedStrategy,
        seed: u64,
        max_steps: Option<u64>,
        liveness: LivenessChecker,
        coverage_enabled: bool,
        user_hashing: bool,
        callbacks: Callbacks,
    ) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                instance: Uuid::new_v4(),
                scheduler: Scheduler::new(strategy, seed, max_steps),
                actors: Mutex::new(BTreeMap::new()),
                named_ids: Mutex::new(HashMap::new()),
                next_actor_seq: AtomicU64::new(0),
                next_timer_seq: AtomicU64::new(0),
                next_resource: AtomicU64::new(0),
                monitors: MonitorRegistry::new(),
                liveness,
                coverage: CoverageCollector::new(coverage_enabled),
                callbacks,
                user_hashing,
            }),
        }
    }

    /// Unique identity of this runtime instance.
    pub fn instance_id(&self) -> Uuid {
        self.inner.instance
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub(crate) fn coverage(&self) -> &CoverageCollector {
        &self.inner.coverage
    }

    pub(crate) fn monitors(&self) -> &MonitorRegistry {
        &self.inner.monitors
    }

    pub(crate) fn liveness(&self) -> &LivenessChecker {
        &self.inner.liveness
    }

    /// The operation currently holding the run signal.
    pub fn current_operation(&self) -> OperationId {
        self.inner.scheduler.current()
    }

    pub(crate) fn next_resource_id(&self) -> u64 {
        self.inner.next_resource.fetch_add(1, Ordering::Relaxed)
    }

    // --- scheduling points ----------------------------------------------

    /// A scheduling point at which the caller stays enabled.
    pub(crate) async fn schedule_point(&self, context: Option<String>) {
        self.liveness_step();
        self.inner.scheduler.schedule_next(context).await;
    }

    /// A scheduling point at which the caller blocks on a resource.
    pub(crate) async fn suspend(&self, reason: WaitReason) {
        self.liveness_step();
        self.inner.scheduler.suspend_current(reason, None).await;
    }

    /// Suspend in a delay whose expiry is the scheduler's choice. The
    /// duration is part of the program's vocabulary, not wall-clock time.
    pub async fn delay(&self, duration: Duration) {
        self.liveness_step();
        self.inner
            .scheduler
            .delay_current(Some(format!("delay({}ms)", duration.as_millis())))
            .await;
    }

    /// Yield to the scheduler without blocking: other enabled operations
    /// may run before the caller continues.
    pub async fn yield_now(&self) {
        self.schedule_point(None).await;
    }

    pub(crate) fn complete_current(&self) {
        self.inner.scheduler.complete_current(None);
    }

    fn liveness_step(&self) {
        let hot = self.inner.monitors.hot_monitors();
        let hash = self
            .inner
            .liveness
            .cycle_detection()
            .then(|| self.global_state_hash());
        if let Some(error) =
            self.inner
                .liveness
                .on_step(self.inner.scheduler.is_strategy_fair(), &hot, hash)
        {
            self.fail_and_report(error);
        }
    }

    // --- failure ---------------------------------------------------------

    pub(crate) fn fail_and_report(&self, error: RuntimeError) {
        if let Some(callback) = &self.inner.callbacks.on_failure {
            callback(&error);
        }
        self.inner.scheduler.fail(error);
    }

    /// Record the failure and park the calling operation; the iteration is
    /// over and the parked body is dropped at teardown.
    pub(crate) async fn fail_now(&self, error: RuntimeError) {
        self.fail_and_report(error);
        futures::future::pending::<()>().await;
    }

    /// Fail the iteration with `AssertionFailure` when `condition` is false.
    pub async fn assert_that(&self, condition: bool, message: impl Into<String>) {
        if !condition {
            self.fail_now(RuntimeError::AssertionFailure(message.into()))
                .await;
        }
    }

    // --- nondeterministic choices ---------------------------------------

    /// A nondeterministic boolean chosen by the strategy and recorded in
    /// the schedule.
    pub async fn random_boolean(&self) -> bool {
        let value = self.inner.scheduler.next_boolean(None);
        self.inner.scheduler.park_if_stopped().await;
        value
    }

    /// A nondeterministic boolean routed through the fair selector.
    pub async fn fair_random_boolean(&self) -> bool {
        let value = self.inner.scheduler.next_fair_boolean(None);
        self.inner.scheduler.park_if_stopped().await;
        value
    }

    /// A nondeterministic integer in `[0, max_exclusive)`.
    pub async fn random_integer(&self, max_exclusive: u32) -> u32 {
        let value = self.inner.scheduler.next_integer(max_exclusive, None);
        self.inner.scheduler.park_if_stopped().await;
        value
    }

    // --- controlled tasks ------------------------------------------------

    /// Spawn a controlled task; the creation is a scheduling point before
    /// the creator continues.
    pub async fn spawn<T, F>(&self, body: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        self.spawn_task(Box::pin(async move { Ok(body.await) }), None)
            .await
    }

    /// Spawn a task whose body may fail with a [`TaskError`].
    pub async fn spawn_fallible<T, F>(&self, body: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn_task(Box::pin(body), None).await
    }

    /// Spawn with a cancellation token, observed at suspension points. An
    /// already-canceled token yields a terminal canceled task without
    /// running the body.
    pub async fn spawn_with_token<T, F>(
        &self,
        body: F,
        token: CancellationToken,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        if token.is_canceled() {
            return self.from_canceled();
        }
        self.spawn_task(Box::pin(async move { Ok(body.await) }), Some(token))
            .await
    }

    async fn spawn_task<T: Send + 'static>(
        &self,
        body: BoxFuture<'static, Result<T, TaskError>>,
        token: Option<CancellationToken>,
    ) -> TaskHandle<T> {
        let (op, signal) = self
            .inner
            .scheduler
            .create_operation(OperationKind::Task, None);
        let state = TaskState::pending(op);
        let handle = TaskHandle {
            runtime: self.clone(),
            state: Arc::clone(&state),
        };

        let runtime = self.clone();
        tokio::spawn(async move {
            signal.acquired().await;
            let result = match token {
                Some(token) => Cancellable::new(body, token).await,
                None => body.await,
            };
            let canceled = matches!(result, Err(TaskError::Canceled));
            if canceled {
                debug!(%op, "task canceled");
            }
            for waiter in state.complete(result) {
                runtime.unblock_task_waiter(waiter, op);
            }
            runtime.complete_current();
        });

        self.schedule_point(Some(format!("spawn {op}"))).await;
        handle
    }

    /// An already-completed task carrying `()`.
    pub fn completed_task(&self) -> TaskHandle<()> {
        self.from_result(())
    }

    /// An already-completed task carrying `value`.
    pub fn from_result<T: Send + 'static>(&self, value: T) -> TaskHandle<T> {
        TaskHandle {
            runtime: self.clone(),
            state: TaskState::terminal(Ok(value)),
        }
    }

    /// An already-faulted task.
    pub fn from_error<T: Send + 'static>(&self, message: impl Into<String>) -> TaskHandle<T> {
        TaskHandle {
            runtime: self.clone(),
            state: TaskState::terminal(Err(TaskError::Failed(message.into()))),
        }
    }

    /// An already-canceled task.
    pub fn from_canceled<T: Send + 'static>(&self) -> TaskHandle<T> {
        TaskHandle {
            runtime: self.clone(),
            state: TaskState::terminal(Err(TaskError::Canceled)),
        }
    }

    pub(crate) fn unblock_task_waiter(&self, waiter: OperationId, task_op: OperationId) {
        self.inner.scheduler.unblock_when(waiter, |reason| match reason {
            WaitReason::TaskCompletion(op) => *op == task_op,
            WaitReason::AnyTaskCompletion(ops) => ops.contains(&task_op),
            _ => false,
        });
    }

    pub(crate) fn unblock_completion(&self, waiter: OperationId, resource: u64) {
        self.inner.scheduler.unblock_when(waiter, |reason| {
            matches!(reason, WaitReason::Completion(id) if *id == resource)
        });
    }

    pub(crate) fn unblock_lock(&self, waiter: OperationId, lock: u64) {
        self.inner.scheduler.unblock_when(waiter, |reason| {
            matches!(reason, WaitReason::LockAcquire(id) if *id == lock)
        });
    }

    pub(crate) fn unblock_semaphore(&self, waiter: OperationId, semaphore: u64) {
        self.inner.scheduler.unblock_when(waiter, |reason| {
            matches!(reason, WaitReason::SemaphoreWait(id) if *id == semaphore)
        });
    }

    // --- actor ids -------------------------------------------------------

    /// Deterministic id bound to a (type, name) pair; binding happens at
    /// the first creation that uses it.
    pub fn actor_id_from_name<A: Actor>(&self, name: impl Into<String>) -> ActorId {
        self.reserve_named_id(type_name_of::<A>(), name.into())
    }

    /// Deterministic id for a state-machine type and name.
    pub fn machine_id_from_name<M: StateMachine>(&self, name: impl Into<String>) -> ActorId {
        self.reserve_named_id(type_name_of::<M>(), name.into())
    }

    fn reserve_named_id(&self, type_name: &'static str, name: String) -> ActorId {
        let mut named = self.inner.named_ids.lock();
        if let Some(id) = named.get(&(type_name.to_string(), name.clone())) {
            return id.clone();
        }
        let seq = self.inner.next_actor_seq.fetch_add(1, Ordering::Relaxed);
        let id = ActorId::new(seq, type_name, Some(name.clone().into()));
        named.insert((type_name.to_string(), name), id.clone());
        self.inner.actors.lock().insert(
            seq,
            ActorRecord {
                type_name: type_name.to_string(),
                binding: Binding::Reserved,
            },
        );
        id
    }

    // --- actor creation --------------------------------------------------

    /// Create a uniform actor.
    pub async fn create_actor<A: Actor>(&self, actor: A) -> ActorId {
        self.create_actor_with(actor, CreateOptions::new()).await
    }

    pub async fn create_actor_with<A: Actor>(&self, actor: A, options: CreateOptions) -> ActorId {
        self.create_uniform_with_inherited(actor, options, None).await
    }

    /// Create a state machine.
    pub async fn create_machine<M: StateMachine>(&self, machine: M) -> ActorId {
        self.create_machine_with(machine, CreateOptions::new()).await
    }

    pub async fn create_machine_with<M: StateMachine>(
        &self,
        machine: M,
        options: CreateOptions,
    ) -> ActorId {
        self.create_machine_with_inherited(machine, options, None)
            .await
    }

    pub(crate) async fn create_uniform_with_inherited<A: Actor>(
        &self,
        actor: A,
        options: CreateOptions,
        inherited: Option<EventGroup>,
    ) -> ActorId {
        self.create_core(
            Box::new(UniformBehavior(actor)),
            type_name_of::<A>(),
            options,
            inherited,
        )
        .await
    }

    pub(crate) async fn create_machine_with_inherited<M: StateMachine>(
        &self,
        machine: M,
        options: CreateOptions,
        inherited: Option<EventGroup>,
    ) -> ActorId {
        self.create_core(
            Box::new(MachineBehavior(machine)),
            type_name_of::<M>(),
            options,
            inherited,
        )
        .await
    }

    async fn create_core(
        &self,
        behavior: Box<dyn Behavior>,
        type_name: &'static str,
        options: CreateOptions,
        inherited: Option<EventGroup>,
    ) -> ActorId {
        let group = options.group.resolve(inherited.as_ref());
        match self.bind_actor(behavior, type_name, options.name, options.id, group) {
            Ok((id, inbox)) => {
                if let Some(event) = options.initial_event {
                    inbox.enqueue(EventEnvelope::new(event));
                }
                self.schedule_point(Some(format!("create {id}"))).await;
                id
            }
            Err(error) => {
                self.fail_now(error).await;
                // Unreachable: fail_now never returns control here.
                ActorId::new(u64::MAX, type_name, None)
            }
        }
    }

    /// Register the record, build the table, and spawn the host body.
    fn bind_actor(
        &self,
        behavior: Box<dyn Behavior>,
        type_name: &'static str,
        friendly_name: Option<String>,
        bound_id: Option<ActorId>,
        group: Option<EventGroup>,
    ) -> Result<(ActorId, Arc<Inbox>), RuntimeError> {
        let table = behavior.build_table().map_err(|e| {
            RuntimeError::Configuration(format!("machine '{type_name}' table: {e}"))
        })?;

        let id = match bound_id {
            Some(id) => {
                let mut actors = self.inner.actors.lock();
                match actors.get(&id.value()) {
                    Some(record) => {
                        if record.type_name != type_name {
                            return Err(RuntimeError::TypeMismatch {
                                id: id.clone(),
                                expected: record.type_name.clone(),
                                actual: type_name.to_string(),
                            });
                        }
                        if matches!(record.binding, Binding::Live(_)) {
                            return Err(RuntimeError::ActorIdReuse(id.clone()));
                        }
                    }
                    None => {
                        actors.insert(
                            id.value(),
                            ActorRecord {
                                type_name: type_name.to_string(),
                                binding: Binding::Reserved,
                            },
                        );
                    }
                }
                id
            }
            None => {
                let seq = self.inner.next_actor_seq.fetch_add(1, Ordering::Relaxed);
                let id = ActorId::new(seq, type_name, friendly_name.map(Into::into));
                self.inner.actors.lock().insert(
                    seq,
                    ActorRecord {
                        type_name: type_name.to_string(),
                        binding: Binding::Reserved,
                    },
                );
                id
            }
        };

        let (op, signal) = self
            .inner
            .scheduler
            .create_operation(OperationKind::Actor(id.clone()), Some(id.to_string()));
        let inbox = Arc::new(Inbox::new());

        {
            let mut actors = self.inner.actors.lock();
            if let Some(record) = actors.get_mut(&id.value()) {
                record.binding = Binding::Live(LiveActor {
                    op,
                    inbox: Arc::clone(&inbox),
                    status: ActorStatus::Created,
                    stack: Vec::new(),
                    user_hash: 0,
                    receive: None,
                    timers: Vec::new(),
                });
            }
        }

        self.inner.coverage.machine_created(type_name, false);
        debug!(actor = %id, %op, "actor created");

        let host = ActorHost::new(
            self.clone(),
            id.clone(),
            op,
            signal,
            behavior,
            table,
            Arc::clone(&inbox),
            group,
        );
        tokio::spawn(host.run());
        Ok((id, inbox))
    }

    // --- sends -----------------------------------------------------------

    /// Send an event from outside any actor (the test driver).
    pub async fn send_event(&self, target: &ActorId, event: impl Event) {
        self.post_event(None, target, Box::new(event), None, None)
            .await;
    }

    /// Send with an explicit group and/or instance bound from the driver.
    pub async fn send_event_with(
        &self,
        target: &ActorId,
        event: impl Event,
        options: super::options::SendOptions,
    ) {
        let group = match options.group {
            GroupChoice::Inherit => None,
            other => other.resolve(None),
        };
        self.post_event(None, target, Box::new(event), group, options.max_instances)
            .await;
    }

    /// Enqueue an event and hit the send scheduling point.
    pub(crate) async fn post_event(
        &self,
        sender: Option<ActorId>,
        target: &ActorId,
        event: Box<dyn Event>,
        group: Option<EventGroup>,
        max_instances: Option<u32>,
    ) {
        let label = format!("{}->{}", target, event.name());
        match self.enqueue_event(sender, target, event, group, max_instances) {
            Ok(()) => self.schedule_point(Some(label)).await,
            Err(error) => self.fail_now(error).await,
        }
    }

    fn enqueue_event(
        &self,
        sender: Option<ActorId>,
        target: &ActorId,
        event: Box<dyn Event>,
        group: Option<EventGroup>,
        max_instances: Option<u32>,
    ) -> Result<(), RuntimeError> {
        enum Delivery {
            Dropped(Box<dyn Event>),
            WakeReceive(OperationId),
            WakeDequeue(OperationId),
            Queued,
        }

        if let Some(sender) = &sender {
            self.inner
                .coverage
                .event_sent(sender.type_name(), event.name());
        }

        let delivery = {
            let mut actors = self.inner.actors.lock();
            let record = actors
                .get_mut(&target.value())
                .ok_or_else(|| RuntimeError::UnboundActor(target.clone()))?;

            match &mut record.binding {
                Binding::Reserved => return Err(RuntimeError::UnboundActor(target.clone())),
                Binding::Halted => Delivery::Dropped(event),
                Binding::Live(live) => {
                    let key = event.key();
                    let event_name = event.name();
                    let envelope = EventEnvelope {
                        event,
                        sender,
                        group,
                    };
                    let existing = live.inbox.enqueue(envelope);
                    if let Some(limit) = max_instances {
                        if existing >= limit as usize {
                            return Err(RuntimeError::MaxInstancesExceeded {
                                receiver: target.to_string(),
                                event: event_name.to_string(),
                                limit,
                            });
                        }
                    }
                    match &live.receive {
                        Some(keys) if keys.contains(&key) => Delivery::WakeReceive(live.op),
                        Some(_) => Delivery::Queued,
                        None => Delivery::WakeDequeue(live.op),
                    }
                }
            }
        };

        match delivery {
            Delivery::Dropped(event) => {
                trace!(actor = %target, event = event.name(), "event dropped at halted actor");
                self.notify_dropped(target, &*event);
            }
            Delivery::WakeReceive(op) => {
                self.inner
                    .scheduler
                    .unblock_when(op, |reason| matches!(reason, WaitReason::Receive(_)));
            }
            Delivery::WakeDequeue(op) => {
                self.inner
                    .scheduler
                    .unblock_when(op, |reason| matches!(reason, WaitReason::Dequeue));
            }
            Delivery::Queued => {}
        }
        Ok(())
    }

    /// Send, then drive until the target's inbox drains, the target blocks
    /// on a resource, or it halts. Returns whether the target handled the
    /// event rather than dropping it.
    pub(crate) async fn send_and_execute(
        &self,
        sender: Option<ActorId>,
        target: &ActorId,
        event: Box<dyn Event>,
        group: Option<EventGroup>,
    ) -> bool {
        if let Err(error) = self.enqueue_event(sender, target, event, group, None) {
            self.fail_now(error).await;
            return false;
        }
        loop {
            self.schedule_point(Some(format!("execute {target}"))).await;
            let (halted, empty, op) = {
                let actors = self.inner.actors.lock();
                match actors.get(&target.value()).map(|r| &r.binding) {
                    Some(Binding::Live(live)) => {
                        (false, live.inbox.is_empty(), Some(live.op))
                    }
                    _ => (true, true, None),
                }
            };
            if halted {
                return false;
            }
            if empty {
                return true;
            }
            // A target blocked on anything but its inbox cannot drain it.
            if let Some(op) = op {
                let blocked = self
                    .inner
                    .scheduler
                    .statuses()
                    .into_iter()
                    .any(|(id, status)| {
                        id == op
                            && matches!(&status, OperationStatus::Waiting(r) if !r.is_quiescent())
                    });
                if blocked {
                    return false;
                }
            }
        }
    }

    // --- receive ---------------------------------------------------------

    /// Explicit receive: wait for an inbox event matching `keys`,
    /// bypassing the dispatch masks.
    pub(crate) async fn receive_event(
        &self,
        owner: &ActorId,
        keys: Vec<EventKey>,
        names: Vec<&'static str>,
    ) -> EventEnvelope {
        loop {
            {
                let mut actors = self.inner.actors.lock();
                if let Some(record) = actors.get_mut(&owner.value()) {
                    if let Binding::Live(live) = &mut record.binding {
                        if let Some(envelope) = live.inbox.take_matching(&keys) {
                            live.receive = None;
                            drop(actors);
                            self.inner
                                .coverage
                                .event_received(owner.type_name(), envelope.event_name());
                            return envelope;
                        }
                        live.receive = Some(keys.clone());
                    }
                }
            }
            self.suspend(WaitReason::Receive(names.clone())).await;
        }
    }

    // --- monitors --------------------------------------------------------

    /// Register a specification monitor. Must happen before any actor is
    /// created.
    pub fn register_monitor<M: Monitor>(&self, monitor: M) -> Result<(), RuntimeError> {
        self.inner.monitors.register(monitor, &self.inner.coverage)
    }

    /// Synchronously deliver an event to the monitor of type `M`; the
    /// monitor runs to quiescence before this returns. Not a scheduling
    /// point.
    pub async fn invoke_monitor<M: Monitor>(&self, event: impl Event) {
        let result =
            self.inner
                .monitors
                .invoke(std::any::TypeId::of::<M>(), &event, &self.inner.coverage);
        if let Err(error) = result {
            self.fail_now(error).await;
        }
    }

    // --- timers ----------------------------------------------------------

    /// Start a timer owned by `owner`. The timer is an internal operation
    /// whose firing is a scheduling choice.
    pub(crate) async fn start_timer(
        &self,
        owner: &ActorId,
        due: Duration,
        period: Option<Duration>,
    ) -> TimerId {
        let timer_id = TimerId::new(self.inner.next_timer_seq.fetch_add(1, Ordering::Relaxed));
        let (op, signal) = self.inner.scheduler.create_operation(
            OperationKind::Timer(owner.clone()),
            Some(format!("{timer_id}@{owner}")),
        );
        {
            let mut actors = self.inner.actors.lock();
            if let Some(record) = actors.get_mut(&owner.value()) {
                if let Binding::Live(live) = &mut record.binding {
                    live.timers.push((timer_id, op));
                }
            }
        }
        let info = TimerInfo {
            id: timer_id,
            owner: owner.clone(),
            due,
            period,
        };
        let runtime = self.clone();
        tokio::spawn(async move {
            signal.acquired().await;
            loop {
                let elapsed = TimerElapsedEvent { info: info.clone() };
                if let Err(error) =
                    runtime.enqueue_event(None, &info.owner, Box::new(elapsed), None, None)
                {
                    // The owner halted and was removed; retire quietly.
                    trace!(%error, "timer fire skipped");
                    break;
                }
                if info.period.is_none() {
                    break;
                }
                runtime
                    .schedule_point(Some(format!("{} fired", info.id)))
                    .await;
            }
            runtime.complete_current();
        });
        self.schedule_point(Some(format!("start {timer_id}"))).await;
        timer_id
    }

    pub(crate) fn stop_timer(&self, owner: &ActorId, timer: TimerId) {
        let mut actors = self.inner.actors.lock();
        if let Some(record) = actors.get_mut(&owner.value()) {
            if let Binding::Live(live) = &mut record.binding {
                if let Some(index) = live.timers.iter().position(|(id, _)| *id == timer) {
                    let (_, op) = live.timers.remove(index);
                    self.inner.scheduler.retire(op);
                }
            }
        }
    }

    // --- actor record bookkeeping ---------------------------------------

    pub(crate) fn actor_initializing(&self, id: &ActorId) {
        self.set_actor_status(id, ActorStatus::Initialized);
    }

    pub(crate) fn actor_running(&self, id: &ActorId) {
        self.set_actor_status(id, ActorStatus::Running);
    }

    fn set_actor_status(&self, id: &ActorId, status: ActorStatus) {
        let mut actors = self.inner.actors.lock();
        if let Some(record) = actors.get_mut(&id.value()) {
            if let Binding::Live(live) = &mut record.binding {
                live.status = status;
            }
        }
    }

    /// Lifecycle status of the actor bound to `id`; `None` for ids that
    /// were never bound.
    pub fn actor_status(&self, id: &ActorId) -> Option<ActorStatus> {
        let actors = self.inner.actors.lock();
        actors.get(&id.value()).and_then(|record| match &record.binding {
            Binding::Reserved => None,
            Binding::Halted => Some(ActorStatus::Halted),
            Binding::Live(live) => Some(live.status),
        })
    }

    /// Unbind a halting actor: retire its timers and mark the id free for
    /// rebinding.
    pub(crate) fn actor_halted(&self, id: &ActorId) {
        let timers = {
            let mut actors = self.inner.actors.lock();
            match actors.get_mut(&id.value()) {
                Some(record) => {
                    let timers = match &mut record.binding {
                        Binding::Live(live) => std::mem::take(&mut live.timers),
                        _ => Vec::new(),
                    };
                    record.binding = Binding::Halted;
                    timers
                }
                None => Vec::new(),
            }
        };
        for (_, op) in timers {
            self.inner.scheduler.retire(op);
        }
        debug!(actor = %id, "actor halted");
    }

    pub(crate) fn notify_dropped(&self, id: &ActorId, event: &dyn Event) {
        warn!(actor = %id, event = event.name(), "event dropped");
        if let Some(callback) = &self.inner.callbacks.on_event_dropped {
            callback(id, event);
        }
    }

    pub(crate) fn update_stack_mirror(&self, id: &ActorId, stack: Vec<&'static str>) {
        let mut actors = self.inner.actors.lock();
        if let Some(record) = actors.get_mut(&id.value()) {
            if let Binding::Live(live) = &mut record.binding {
                live.stack = stack;
            }
        }
    }

    pub(crate) fn update_user_hash(&self, id: &ActorId, hash: u64) {
        if !self.inner.user_hashing {
            return;
        }
        let mut actors = self.inner.actors.lock();
        if let Some(record) = actors.get_mut(&id.value()) {
            if let Binding::Live(live) = &mut record.binding {
                live.user_hash = hash;
            }
        }
    }

    // --- coverage hooks --------------------------------------------------

    pub(crate) fn coverage_event_received(&self, id: &ActorId, _state: &str, event: &str) {
        self.inner.coverage.event_received(id.type_name(), event);
    }

    pub(crate) fn coverage_state_visited(&self, id: &ActorId, state: &str) {
        self.inner.coverage.state_visited(id.type_name(), state);
    }

    pub(crate) fn coverage_transition(&self, id: &ActorId, from: &str, event: &str, to: &str) {
        self.inner
            .coverage
            .transition(id.type_name(), from, event, to);
    }

    // --- state hashing ---------------------------------------------------

    /// Digest of the global program state: actor stacks, inbox contents,
    /// monitor states, and (optionally) user-supplied hashes.
    pub(crate) fn global_state_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        {
            let actors = self.inner.actors.lock();
            for (value, record) in actors.iter() {
                value.hash(&mut hasher);
                match &record.binding {
                    Binding::Reserved => 0u8.hash(&mut hasher),
                    Binding::Halted => 1u8.hash(&mut hasher),
                    Binding::Live(live) => {
                        2u8.hash(&mut hasher);
                        live.stack.hash(&mut hasher);
                        live.inbox.event_names().hash(&mut hasher);
                        if self.inner.user_hashing {
                            live.user_hash.hash(&mut hasher);
                        }
                    }
                }
            }
        }
        self.inner
            .monitors
            .hash_into(&mut hasher, self.inner.user_hashing);
        hasher.finish()
    }
}

fn type_name_of<T>() -> &'static str {
    short_type_name(std::any::type_name::<T>())
}
