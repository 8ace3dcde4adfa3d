//! Serializes all logical concurrency into one sequential execution.
//!
//! Every live actor and controlled task is an [`Operation`] gated by a
//! suspension signal. At each scheduling point the running operation hands
//! control back to the scheduler, which refreshes the enabled set, asks the
//! strategy for the next operation, records the decision, and grants that
//! operation's signal. Exactly one user operation runs at any time, so user
//! code observes linearizable memory without locks.

pub mod operation;

pub use operation::{Operation, OperationKind, OperationSignal, OperationStatus, WaitReason};

// Layer 1: Standard library imports
use std::collections::BTreeMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error, trace};

// Layer 3: Internal module imports
use crate::runtime::errors::{BlockedOperation, DeadlockInfo, RuntimeError};
use crate::schedule::{Decision, Schedule};
use crate::strategy::SchedulingStrategy;
use crate::util::OperationId;

/// Strategy handle shared between the engine (across iterations) and the
/// scheduler (within one iteration).
pub type SharedStrategy = Arc<Mutex<Box<dyn SchedulingStrategy>>>;

/// Why an iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// All operations completed or idle; the program finished its work.
    Quiescence,
    /// The per-iteration step budget was reached.
    StepBudget,
    /// A safety or liveness violation was detected.
    Failure,
}

struct SchedulerState {
    ops: BTreeMap<OperationId, Operation>,
    current: OperationId,
    next_seq: u64,
    steps: u64,
    schedule: Schedule,
    error: Option<RuntimeError>,
    stop: Option<StopReason>,
}

enum Pick {
    /// The strategy picked the calling operation again; keep running.
    Continue,
    /// Another operation was granted; the caller must suspend.
    Suspended(Arc<OperationSignal>),
    /// The iteration is over; the caller must park until teardown.
    Stopped,
}

/// The operation registry and scheduling-point engine for one iteration.
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    strategy: SharedStrategy,
    done: Notify,
    max_steps: Option<u64>,
}

impl Scheduler {
    pub fn new(strategy: SharedStrategy, seed: u64, max_steps: Option<u64>) -> Self {
        let header = strategy.lock().name();
        Self {
            state: Mutex::new(SchedulerState {
                ops: BTreeMap::new(),
                current: OperationId::ROOT,
                next_seq: 0,
                steps: 0,
                schedule: Schedule::new(header, seed),
                error: None,
                stop: None,
            }),
            strategy,
            done: Notify::new(),
            max_steps,
        }
    }

    /// Register a new operation. The registration itself is not a
    /// scheduling point; the creator yields right after spawning the
    /// operation's body.
    pub fn create_operation(
        &self,
        kind: OperationKind,
        name: Option<String>,
    ) -> (OperationId, Arc<OperationSignal>) {
        let mut st = self.state.lock();
        let id = OperationId::new(st.next_seq);
        st.next_seq += 1;
        let op = Operation::new(id, kind, name.unwrap_or_else(|| id.to_string()));
        let signal = Arc::clone(&op.signal);
        trace!(%id, name = %op.name, "operation created");
        st.ops.insert(id, op);
        (id, signal)
    }

    /// Grant the root operation and begin the iteration.
    pub fn start(&self) {
        let st = self.state.lock();
        if let Some(root) = st.ops.get(&OperationId::ROOT) {
            root.signal.grant();
        }
    }

    /// Wait until the iteration stops for any reason.
    pub async fn wait_until_done(&self) {
        self.done.notified().await;
    }

    /// The operation currently holding the run signal.
    pub fn current(&self) -> OperationId {
        self.state.lock().current
    }

    pub fn operation_name(&self, id: OperationId) -> Option<String> {
        self.state.lock().ops.get(&id).map(|op| op.name.clone())
    }

    pub fn steps(&self) -> u64 {
        self.state.lock().steps
    }

    pub fn schedule(&self) -> Schedule {
        self.state.lock().schedule.clone()
    }

    pub fn error(&self) -> Option<RuntimeError> {
        self.state.lock().error.clone()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.state.lock().stop
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stop.is_some()
    }

    /// Whether the installed strategy is fair (liveness checking needs it).
    pub fn is_strategy_fair(&self) -> bool {
        self.strategy.lock().is_fair()
    }

    /// A scheduling point at which the caller stays enabled.
    pub async fn schedule_next(&self, context: Option<String>) {
        let pick = {
            let mut st = self.state.lock();
            self.pick_and_grant(&mut st, context)
        };
        self.follow(pick).await;
    }

    /// A scheduling point at which the caller blocks on a resource.
    ///
    /// The caller must have registered itself with the resource's waiter
    /// list first; [`unblock`](Self::unblock) re-enables it.
    pub async fn suspend_current(&self, reason: WaitReason, context: Option<String>) {
        let pick = {
            let mut st = self.state.lock();
            let me = st.current;
            if let Some(op) = st.ops.get_mut(&me) {
                op.status = OperationStatus::Waiting(reason);
            }
            self.pick_and_grant(&mut st, context)
        };
        self.follow(pick).await;
    }

    /// A scheduling point entering a delay: the operation stays selectable,
    /// and being selected means the scheduler decided the delay elapsed.
    pub async fn delay_current(&self, context: Option<String>) {
        let pick = {
            let mut st = self.state.lock();
            let me = st.current;
            if let Some(op) = st.ops.get_mut(&me) {
                op.status = OperationStatus::Delayed;
            }
            self.pick_and_grant(&mut st, context)
        };
        self.follow(pick).await;
    }

    /// Mark a waiting operation's condition as holding again.
    pub fn unblock(&self, id: OperationId) {
        self.unblock_when(id, |_| true);
    }

    /// Unblock `id` only when its wait reason satisfies the predicate, so
    /// an operation waiting on one resource is never woken by another.
    pub fn unblock_when(&self, id: OperationId, pred: impl FnOnce(&WaitReason) -> bool) {
        let mut st = self.state.lock();
        if let Some(op) = st.ops.get_mut(&id) {
            if let OperationStatus::Waiting(reason) = &op.status {
                if pred(reason) {
                    trace!(%id, "operation unblocked");
                    op.status = OperationStatus::Enabled;
                }
            }
        }
    }

    /// Retire an operation without scheduling (stopped timers, halted
    /// actors' timers). The parked body is dropped at teardown.
    pub fn retire(&self, id: OperationId) {
        let mut st = self.state.lock();
        if let Some(op) = st.ops.get_mut(&id) {
            op.status = OperationStatus::Completed;
        }
    }

    /// The calling operation finished; pick a successor and return.
    pub fn complete_current(&self, context: Option<String>) {
        let mut st = self.state.lock();
        let me = st.current;
        if let Some(op) = st.ops.get_mut(&me) {
            op.status = OperationStatus::Completed;
        }
        trace!(%me, "operation completed");
        // The outcome is deliberately dropped: the caller returns and its
        // body ends, so there is nothing to suspend.
        let _ = self.pick_and_grant(&mut st, context);
    }

    /// Resolve a nondeterministic boolean choice and record it.
    pub fn next_boolean(&self, context: Option<String>) -> bool {
        let value = self.strategy.lock().next_boolean();
        let mut st = self.state.lock();
        st.steps += 1;
        st.schedule.push(Decision::Boolean(value), context);
        drop(st);
        self.check_divergence();
        value
    }

    /// Resolve a fair nondeterministic boolean choice and record it.
    pub fn next_fair_boolean(&self, context: Option<String>) -> bool {
        let value = self.strategy.lock().next_fair_boolean();
        let mut st = self.state.lock();
        st.steps += 1;
        st.schedule.push(Decision::FairBoolean(value), context);
        drop(st);
        self.check_divergence();
        value
    }

    /// Resolve a nondeterministic integer choice in `[0, max)` and record it.
    pub fn next_integer(&self, max_exclusive: u32, context: Option<String>) -> u32 {
        let value = self.strategy.lock().next_integer(max_exclusive);
        let mut st = self.state.lock();
        st.steps += 1;
        st.schedule.push(Decision::Integer(value), context);
        drop(st);
        self.check_divergence();
        value
    }

    /// Record a failure, stop the iteration, and release the driver.
    pub fn fail(&self, err: RuntimeError) {
        let mut st = self.state.lock();
        self.fail_locked(&mut st, err);
    }

    /// Park the caller forever if the iteration already stopped. Parked
    /// bodies are dropped when the iteration's runtime is torn down.
    pub async fn park_if_stopped(&self) {
        let stopped = self.state.lock().stop.is_some();
        if stopped {
            futures::future::pending::<()>().await;
        }
    }

    /// Snapshot of (id, status) pairs for diagnostics and drive loops.
    pub fn statuses(&self) -> Vec<(OperationId, OperationStatus)> {
        self.state
            .lock()
            .ops
            .values()
            .map(|op| (op.id, op.status.clone()))
            .collect()
    }

    async fn follow(&self, pick: Pick) {
        match pick {
            Pick::Continue => {}
            Pick::Suspended(signal) => signal.acquired().await,
            Pick::Stopped => futures::future::pending::<()>().await,
        }
    }

    fn check_divergence(&self) {
        let divergence = self.strategy.lock().divergence();
        if let Some(d) = divergence {
            self.fail(RuntimeError::ReplayDivergence {
                divergence: d.to_string(),
            });
        }
    }

    /// The selection protocol. Called with the caller's new status already
    /// written; returns what the caller should do next.
    fn pick_and_grant(&self, st: &mut SchedulerState, context: Option<String>) -> Pick {
        if st.stop.is_some() {
            return Pick::Stopped;
        }
        if let Some(max) = self.max_steps {
            if st.steps >= max {
                debug!(steps = st.steps, "step budget reached");
                self.halt_iteration(st, StopReason::StepBudget);
                return Pick::Stopped;
            }
        }

        let enabled: Vec<OperationId> = st
            .ops
            .values()
            .filter(|op| op.status.is_selectable())
            .map(|op| op.id)
            .collect();

        if enabled.is_empty() {
            let blocked: Vec<BlockedOperation> = st
                .ops
                .values()
                .filter_map(|op| match &op.status {
                    OperationStatus::Waiting(reason) => Some(BlockedOperation {
                        operation: op.name.clone(),
                        reason: reason.to_string(),
                    }),
                    _ => None,
                })
                .collect();
            let has_real_block = st.ops.values().any(|op| {
                matches!(&op.status, OperationStatus::Waiting(r) if !r.is_quiescent())
            });
            if has_real_block {
                self.fail_locked(st, RuntimeError::Deadlock(DeadlockInfo { blocked }));
            } else {
                self.halt_iteration(st, StopReason::Quiescence);
            }
            return Pick::Stopped;
        }

        let next = self.strategy.lock().next_operation(&enabled, st.current);
        let Some(next) = next else {
            let divergence = self.strategy.lock().divergence();
            let err = match divergence {
                Some(d) => RuntimeError::ReplayDivergence {
                    divergence: d.to_string(),
                },
                None => RuntimeError::StrategyBug(format!(
                    "strategy returned no operation while {} were enabled",
                    enabled.len()
                )),
            };
            self.fail_locked(st, err);
            return Pick::Stopped;
        };
        if !enabled.contains(&next) {
            self.fail_locked(
                st,
                RuntimeError::StrategyBug(format!("strategy chose non-enabled operation {next}")),
            );
            return Pick::Stopped;
        }

        st.steps += 1;
        st.schedule.push(Decision::Operation(next), context);

        // Selecting a delayed operation is the scheduler deciding that its
        // delay elapsed.
        if let Some(op) = st.ops.get_mut(&next) {
            if op.status == OperationStatus::Delayed {
                op.status = OperationStatus::Enabled;
            }
        }

        let previous = st.current;
        st.current = next;
        trace!(%previous, %next, step = st.steps, "scheduling point");

        if previous == next {
            return Pick::Continue;
        }
        if let Some(op) = st.ops.get(&next) {
            op.signal.grant();
        }
        match st.ops.get(&previous) {
            Some(op) => Pick::Suspended(Arc::clone(&op.signal)),
            None => Pick::Continue,
        }
    }

    fn halt_iteration(&self, st: &mut SchedulerState, reason: StopReason) {
        if st.stop.is_none() {
            st.stop = Some(reason);
            self.done.notify_one();
        }
    }

    fn fail_locked(&self, st: &mut SchedulerState, err: RuntimeError) {
        if st.error.is_none() {
            error!(%err, "iteration failed");
            st.error = Some(err);
        }
        self.halt_iteration(st, StopReason::Failure);
    }
}
