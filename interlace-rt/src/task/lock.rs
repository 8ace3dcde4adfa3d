//! Cooperative mutual exclusion with FIFO handoff.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::trace;

// Layer 3: Internal module imports
use crate::runtime::Runtime;
use crate::scheduler::WaitReason;
use crate::util::OperationId;

struct LockState {
    owner: Option<OperationId>,
    depth: u32,
    waiters: VecDeque<OperationId>,
}

/// A cooperative lock keyed by owning operation.
///
/// Reentry by the owning operation is allowed; release hands ownership to
/// the head of the FIFO waiter queue.
#[derive(Clone)]
pub struct Lock {
    runtime: Runtime,
    id: u64,
    state: Arc<Mutex<LockState>>,
}

impl Lock {
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            id: runtime.next_resource_id(),
            state: Arc::new(Mutex::new(LockState {
                owner: None,
                depth: 0,
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Acquire the lock, suspending behind the FIFO queue if held by
    /// another operation. Acquisition is a scheduling point.
    pub async fn acquire(&self) -> LockGuard {
        self.runtime.schedule_point(None).await;
        let me = self.runtime.current_operation();
        let must_wait = {
            let mut state = self.state.lock();
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    false
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    false
                }
                Some(_) => {
                    state.waiters.push_back(me);
                    true
                }
            }
        };
        if must_wait {
            self.runtime.suspend(WaitReason::LockAcquire(self.id)).await;
            // Ownership was handed to us by the releasing operation.
            debug_assert_eq!(self.state.lock().owner, Some(me));
        }
        trace!(lock = self.id, %me, "lock acquired");
        LockGuard { lock: self.clone() }
    }

    /// Whether the calling operation currently owns the lock.
    pub fn is_held_by_current(&self) -> bool {
        self.state.lock().owner == Some(self.runtime.current_operation())
    }

    fn release(&self) {
        let handoff = {
            let mut state = self.state.lock();
            state.depth = state.depth.saturating_sub(1);
            if state.depth > 0 {
                None
            } else {
                match state.waiters.pop_front() {
                    Some(next) => {
                        state.owner = Some(next);
                        state.depth = 1;
                        Some(next)
                    }
                    None => {
                        state.owner = None;
                        None
                    }
                }
            }
        };
        if let Some(next) = handoff {
            trace!(lock = self.id, %next, "lock handoff");
            self.runtime.unblock_lock(next, self.id);
        }
    }
}

/// RAII guard; dropping it releases one level of the reentrant lock and
/// hands off to the head waiter.
pub struct LockGuard {
    lock: Lock,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}
