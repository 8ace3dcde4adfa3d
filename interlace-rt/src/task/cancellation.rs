//! Cooperative cancellation.

// Layer 1: Standard library imports
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;

// Layer 3: Internal module imports
use super::handle::TaskError;

/// A cooperative cancellation token.
///
/// Cancellation is observed only at suspension points the target task
/// crosses; there is no preemption. Spawning a task with an
/// already-canceled token produces a terminal canceled task without
/// running the body.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the token to the canceled state. Irreversible.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

/// Wraps a task body so cancellation is observed at every poll — which,
/// under the controlled runtime, means at every suspension point the body
/// crosses.
pub(crate) struct Cancellable<T> {
    body: BoxFuture<'static, Result<T, TaskError>>,
    token: CancellationToken,
}

impl<T> Cancellable<T> {
    pub(crate) fn new(body: BoxFuture<'static, Result<T, TaskError>>, token: CancellationToken) -> Self {
        Self { body, token }
    }
}

impl<T> Future for Cancellable<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.token.is_canceled() {
            return Poll::Ready(Err(TaskError::Canceled));
        }
        this.body.as_mut().poll(cx)
    }
}
