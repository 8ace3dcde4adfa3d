//! Cooperative counting semaphore with FIFO handoff.

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

struct SemaphoreState {
    permits: u32,
    max: u32,
    waiters: VecDeque<OperationId>,
}

/// A cooperative counting semaphore.
///
/// Waiters queue FIFO; a release hands its permit directly to the head
/// waiter, so barging is impossible under any schedule.
#[derive(Clone)]
pub struct Semaphore {
    runtime: Runtime,
    id: u64,
    state: Arc<Mutex<SemaphoreState>>,
}

impl Semaphore {
    pub fn new(runtime: &Runtime, initial: u32, max: u32) -> Self {
        Self {
            runtime: runtime.clone(),
            id: runtime.next_resource_id(),
            state: Arc::new(Mutex::new(SemaphoreState {
                permits: initial.min(max),
                max,
                waiters: VecDeque::new(),
            })),
        }
    }

    pub fn available(&self) -> u32 {
        self.state.lock().permits
    }

    /// Take one permit, suspending FIFO when none are available. A
    /// scheduling point.
    pub async fn wait(&self) {
        self.runtime.schedule_point(None).await;
        let me = self.runtime.current_operation();
        let must_wait = {
            let mut state = self.state.lock();
            if state.permits > 0 {
                state.permits -= 1;
                false
            } else {
                state.waiters.push_back(me);
                true
            }
        };
        if must_wait {
            self.runtime
                .suspend(WaitReason::SemaphoreWait(self.id))
                .await;
            // The releasing operation transferred its permit to us.
        }
        trace!(semaphore = self.id, %me, "permit taken");
    }

    /// Return one permit, handing it to the head waiter if any.
    pub fn release(&self) {
        let handoff = {
            let mut state = self.state.lock();
            match state.waiters.pop_front() {
                Some(next) => Some(next),
                None => {
                    state.permits = (state.permits + 1).min(state.max);
                    None
                }
            }
        };
        if let Some(next) = handoff {
            trace!(semaphore = self.id, %next, "permit handoff");
            self.runtime.unblock_semaphore(next, self.id);
        }
    }
}
