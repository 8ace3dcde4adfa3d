//! Task handles and join combinators.

// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::future::IntoFuture;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::runtime::Runtime;
use crate::scheduler::WaitReason;
use crate::util::OperationId;

/// Terminal failure of a controlled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task observed a canceled token at a suspension point, or was
    /// started from an already-canceled token.
    Canceled,
    /// The task body failed.
    Failed(String),
    /// Failures aggregated by `when_all`.
    Aggregate(Vec<TaskError>),
}

impl Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Canceled => write!(f, "task was canceled"),
            TaskError::Failed(message) => write!(f, "task failed: {message}"),
            TaskError::Aggregate(errors) => {
                write!(f, "{} task(s) failed", errors.len())
            }
        }
    }
}

impl std::error::Error for TaskError {}

pub(crate) struct TaskState<T> {
    inner: Mutex<TaskInner<T>>,
    /// The scheduler operation of the task body; terminal tasks have none.
    op: Option<OperationId>,
}

struct TaskInner<T> {
    result: Option<Result<T, TaskError>>,
    taken: bool,
    waiters: Vec<OperationId>,
}

impl<T> TaskState<T> {
    pub(crate) fn pending(op: OperationId) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(TaskInner {
                result: None,
                taken: false,
                waiters: Vec::new(),
            }),
            op: Some(op),
        })
    }

    pub(crate) fn terminal(result: Result<T, TaskError>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(TaskInner {
                result: Some(result),
                taken: false,
                waiters: Vec::new(),
            }),
            op: None,
        })
    }

    /// Store the result and return the waiters to unblock, FIFO.
    pub(crate) fn complete(&self, result: Result<T, TaskError>) -> Vec<OperationId> {
        let mut inner = self.inner.lock();
        debug_assert!(inner.result.is_none() && !inner.taken);
        inner.result = Some(result);
        std::mem::take(&mut inner.waiters)
    }

    fn is_completed(&self) -> bool {
        let inner = self.inner.lock();
        inner.result.is_some() || inner.taken
    }

    fn try_take(&self) -> Option<Result<T, TaskError>> {
        let mut inner = self.inner.lock();
        let result = inner.result.take();
        if result.is_some() {
            inner.taken = true;
        }
        result
    }

    fn add_waiter(&self, op: OperationId) {
        self.inner.lock().waiters.push(op);
    }

    fn remove_waiter(&self, op: OperationId) {
        self.inner.lock().waiters.retain(|w| *w != op);
    }
}

/// A controlled task: either a live body scheduled as its own operation,
/// or a terminal value/fault/cancellation.
///
/// Awaiting an incomplete handle blocks the current operation on the
/// task's completion; completed awaiters become enabled in FIFO order and
/// the scheduler decides who runs first.
pub struct TaskHandle<T> {
    pub(crate) runtime: Runtime,
    pub(crate) state: Arc<TaskState<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// The operation backing this task, if it has a live body.
    pub fn operation(&self) -> Option<OperationId> {
        self.state.op
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// Await completion and take the result.
    pub async fn join(self) -> Result<T, TaskError> {
        let me = self.runtime.current_operation();
        loop {
            if let Some(result) = self.state.try_take() {
                return result;
            }
            self.state.add_waiter(me);
            let wait = WaitReason::TaskCompletion(self.state.op.unwrap_or(me));
            self.runtime.suspend(wait).await;
            self.state.remove_waiter(me);
        }
    }
}

impl<T: Send + 'static> IntoFuture for TaskHandle<T> {
    type Output = Result<T, TaskError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.join())
    }
}

/// Wait for every task; faults aggregate and cancellation propagates.
///
/// Ordering: results come back in handle order regardless of completion
/// order. If any task was canceled the whole join is canceled; otherwise
/// any failures come back aggregated in handle order.
pub async fn when_all<T: Send + 'static>(
    handles: Vec<TaskHandle<T>>,
) -> Result<Vec<T>, TaskError> {
    let mut values = Vec::with_capacity(handles.len());
    let mut failures = Vec::new();
    let mut canceled = false;

    for handle in handles {
        match handle.join().await {
            Ok(value) => values.push(value),
            Err(TaskError::Canceled) => canceled = true,
            Err(error) => failures.push(error),
        }
    }
    if canceled {
        return Err(TaskError::Canceled);
    }
    if !failures.is_empty() {
        return Err(TaskError::Aggregate(failures));
    }
    Ok(values)
}

/// Wait until the first task completes. Returns its index along with the
/// handles; the completed handle joins immediately, and its fault (if any)
/// stays observable through that handle only.
pub async fn when_any<T: Send + 'static>(
    handles: Vec<TaskHandle<T>>,
) -> (usize, Vec<TaskHandle<T>>) {
    debug_assert!(!handles.is_empty());
    let Some(runtime) = handles.first().map(|h| h.runtime.clone()) else {
        return (0, handles);
    };
    let me = runtime.current_operation();

    loop {
        if let Some(index) = handles.iter().position(TaskHandle::is_completed) {
            for handle in &handles {
                handle.state.remove_waiter(me);
            }
            return (index, handles);
        }
        let ops: Vec<OperationId> = handles
            .iter()
            .filter_map(|h| h.state.op)
            .collect();
        for handle in &handles {
            handle.state.add_waiter(me);
        }
        runtime.suspend(WaitReason::AnyTaskCompletion(ops)).await;
        for handle in &handles {
            handle.state.remove_waiter(me);
        }
    }
}
