//! Single-assignment completion sources.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use thiserror::Error;

// Layer 3: Internal module imports
use super::handle::TaskError;
use crate::runtime::Runtime;
use crate::scheduler::WaitReason;
use crate::util::OperationId;

/// Error completing an already-completed source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("completion source already has a result")]
    AlreadyCompleted,
}

struct SourceState<T> {
    result: Option<Result<T, TaskError>>,
    waiters: Vec<OperationId>,
}

/// A single-assignment slot that suspends awaiters until a result, fault,
/// or cancellation is bound. Awaiters resume in FIFO order.
pub struct TaskCompletionSource<T> {
    runtime: Runtime,
    resource: u64,
    state: Arc<Mutex<SourceState<T>>>,
}

impl<T> Clone for TaskCompletionSource<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            resource: self.resource,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + 'static> TaskCompletionSource<T> {
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            resource: runtime.next_resource_id(),
            state: Arc::new(Mutex::new(SourceState {
                result: None,
                waiters: Vec::new(),
            })),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().result.is_some()
    }

    /// Bind a successful result; fails if a result is already bound.
    pub fn set_result(&self, value: T) -> Result<(), CompletionError> {
        self.bind(Ok(value))
    }

    /// Bind a successful result; `false` if a result was already bound.
    pub fn try_set_result(&self, value: T) -> bool {
        self.bind(Ok(value)).is_ok()
    }

    /// Bind cancellation; fails if a result is already bound.
    pub fn set_canceled(&self) -> Result<(), CompletionError> {
        self.bind(Err(TaskError::Canceled))
    }

    pub fn try_set_canceled(&self) -> bool {
        self.bind(Err(TaskError::Canceled)).is_ok()
    }

    /// Bind a fault; fails if a result is already bound.
    pub fn set_error(&self, message: impl Into<String>) -> Result<(), CompletionError> {
        self.bind(Err(TaskError::Failed(message.into())))
    }

    pub fn try_set_error(&self, message: impl Into<String>) -> bool {
        self.bind(Err(TaskError::Failed(message.into()))).is_ok()
    }

    /// Await the bound result. Multiple operations may await; each gets a
    /// clone and they resume in FIFO order.
    pub async fn result(&self) -> Result<T, TaskError> {
        let me = self.runtime.current_operation();
        loop {
            {
                let mut state = self.state.lock();
                if let Some(result) = &state.result {
                    return result.clone();
                }
                state.waiters.push(me);
            }
            self.runtime
                .suspend(WaitReason::Completion(self.resource))
                .await;
            self.state.lock().waiters.retain(|w| *w != me);
        }
    }

    fn bind(&self, result: Result<T, TaskError>) -> Result<(), CompletionError> {
        let waiters = {
            let mut state = self.state.lock();
            if state.result.is_some() {
                return Err(CompletionError::AlreadyCompleted);
            }
            state.result = Some(result);
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            self.runtime.unblock_completion(waiter, self.resource);
        }
        Ok(())
    }
}
