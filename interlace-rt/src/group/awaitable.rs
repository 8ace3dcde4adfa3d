//! Event groups carrying an awaitable completion slot.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::EventGroup;
use crate::runtime::Runtime;
use crate::task::{CompletionError, TaskCompletionSource, TaskError};

/// An event group that also carries a single-assignment result of type `T`.
///
/// The group part propagates through sends and creations like any other
/// group; the completion part lets the test driver await a result produced
/// somewhere down the causal chain. Awaiters resume in FIFO order.
pub struct AwaitableEventGroup<T> {
    group: EventGroup,
    source: TaskCompletionSource<T>,
}

impl<T> Clone for AwaitableEventGroup<T> {
    fn clone(&self) -> Self {
        Self {
            group: self.group.clone(),
            source: self.source.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> AwaitableEventGroup<T> {
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            group: EventGroup::new(),
            source: TaskCompletionSource::new(runtime),
        }
    }

    pub fn named(runtime: &Runtime, name: impl Into<std::sync::Arc<str>>) -> Self {
        Self {
            group: EventGroup::named(name),
            source: TaskCompletionSource::new(runtime),
        }
    }

    /// The propagatable group identity.
    pub fn group(&self) -> &EventGroup {
        &self.group
    }

    pub fn is_completed(&self) -> bool {
        self.source.is_completed()
    }

    pub fn set_result(&self, value: T) -> Result<(), CompletionError> {
        self.source.set_result(value)
    }

    pub fn try_set_result(&self, value: T) -> bool {
        self.source.try_set_result(value)
    }

    pub fn set_canceled(&self) -> Result<(), CompletionError> {
        self.source.set_canceled()
    }

    pub fn try_set_canceled(&self) -> bool {
        self.source.try_set_canceled()
    }

    pub fn set_error(&self, message: impl Into<String>) -> Result<(), CompletionError> {
        self.source.set_error(message)
    }

    pub fn try_set_error(&self, message: impl Into<String>) -> bool {
        self.source.try_set_error(message)
    }

    /// Await the bound result; suspends the calling operation.
    pub async fn result(&self) -> Result<T, TaskError> {
        self.source.result().await
    }
}

/// A fan-in group: completes with `true` after `n` successful signals.
///
/// Each participant calls `set_result(true)`; the n-th call completes the
/// group. `set_result(false)` does not count toward completion.
pub struct EventGroupCounter {
    inner: AwaitableEventGroup<bool>,
    remaining: Arc<Mutex<u32>>,
}

impl Clone for EventGroupCounter {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            remaining: Arc::clone(&self.remaining),
        }
    }
}

impl EventGroupCounter {
    pub fn new(runtime: &Runtime, expected: u32) -> Self {
        let counter = Self {
            inner: AwaitableEventGroup::new(runtime),
            remaining: Arc::new(Mutex::new(expected)),
        };
        if expected == 0 {
            let _ = counter.inner.set_result(true);
        }
        counter
    }

    pub fn group(&self) -> &EventGroup {
        self.inner.group()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.is_completed()
    }

    /// Record one signal; `true` signals count down toward completion.
    pub fn set_result(&self, value: bool) -> bool {
        if !value {
            return false;
        }
        let completed = {
            let mut remaining = self.remaining.lock();
            if *remaining == 0 {
                return false;
            }
            *remaining -= 1;
            *remaining == 0
        };
        if completed {
            return self.inner.try_set_result(true);
        }
        false
    }

    /// Await completion of all expected signals.
    pub async fn result(&self) -> Result<bool, TaskError> {
        self.inner.result().await
    }
}
