//! Operation records: the scheduler's view of every unit of interleaving.

// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::sync::Notify;

// Layer 3: Internal module imports
use crate::util::{ActorId, OperationId};

/// What kind of logical concurrency an operation represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// One per live actor or state machine.
    Actor(ActorId),
    /// One per live controlled task.
    Task,
    /// The internal actor driving a timer; firing is a scheduling choice.
    Timer(ActorId),
}

/// Why a waiting operation cannot currently be scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitReason {
    /// Idle actor waiting for a deliverable inbox event. Quiescent: a
    /// program where every live operation waits like this has simply
    /// finished its work.
    Dequeue,
    /// Explicit receive of named event types, bypassing normal dispatch.
    Receive(Vec<&'static str>),
    /// Awaiting completion of another operation's task.
    TaskCompletion(OperationId),
    /// Awaiting the first completion among several tasks.
    AnyTaskCompletion(Vec<OperationId>),
    /// Queued on a lock's FIFO waiter list.
    LockAcquire(u64),
    /// Queued on a semaphore's FIFO waiter list.
    SemaphoreWait(u64),
    /// Awaiting completion of an awaitable event group or completion source.
    Completion(u64),
}

impl WaitReason {
    /// Quiescent waits do not count as deadlock when nothing is enabled.
    pub fn is_quiescent(&self) -> bool {
        matches!(self, WaitReason::Dequeue)
    }
}

impl Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitReason::Dequeue => write!(f, "an event to dequeue"),
            WaitReason::Receive(names) => write!(f, "a receive of [{}]", names.join(", ")),
            WaitReason::TaskCompletion(op) => write!(f, "completion of {op}"),
            WaitReason::AnyTaskCompletion(ops) => {
                let names: Vec<String> = ops.iter().map(ToString::to_string).collect();
                write!(f, "completion of any of [{}]", names.join(", "))
            }
            WaitReason::LockAcquire(id) => write!(f, "lock {id}"),
            WaitReason::SemaphoreWait(id) => write!(f, "semaphore {id}"),
            WaitReason::Completion(id) => write!(f, "completion source {id}"),
        }
    }
}

/// Scheduling status of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// May be selected at the next scheduling point.
    Enabled,
    /// Blocked until the wait condition holds.
    Waiting(WaitReason),
    /// In a delay; selecting the operation means the delay elapsed.
    Delayed,
    /// Finished; never selected again.
    Completed,
}

impl OperationStatus {
    /// Whether the strategy may pick this operation.
    pub fn is_selectable(&self) -> bool {
        matches!(self, OperationStatus::Enabled | OperationStatus::Delayed)
    }
}

/// The suspension signal gating one operation.
///
/// The scheduler grants the signal to resume the operation; the operation
/// awaits it at every suspension. `Notify` stores a permit, so a grant
/// issued before the operation starts waiting is not lost.
#[derive(Debug, Default)]
pub struct OperationSignal {
    notify: Notify,
}

impl OperationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow the operation to take its next step.
    pub fn grant(&self) {
        self.notify.notify_one();
    }

    /// Wait until the scheduler grants the next step.
    pub async fn acquired(&self) {
        self.notify.notified().await;
    }
}

/// One entry in the scheduler's operation table.
#[derive(Debug)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub signal: Arc<OperationSignal>,
    /// Diagnostic name, e.g. `Node(primary)` or `op(3)`.
    pub name: String,
}

impl Operation {
    pub fn new(id: OperationId, kind: OperationKind, name: String) -> Self {
        Self {
            id,
            kind,
            status: OperationStatus::Enabled,
            signal: Arc::new(OperationSignal::new()),
            name,
        }
    }
}
