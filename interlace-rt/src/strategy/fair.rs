//! Fairness wrapper enabling liveness checking over any base strategy.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use tracing::trace;

// Layer 3: Internal module imports
use super::traits::SchedulingStrategy;
use crate::util::OperationId;

/// Wraps a strategy and enforces fairness past a step threshold.
///
/// Up to `fairness_threshold` steps per iteration the wrapped strategy is
/// in charge. Past the threshold, selection becomes round-robin over the
/// enabled set and fair boolean choices alternate, so every
/// continually-enabled operation (and both branches of a fair choice) keep
/// being taken — the precondition for hot-state liveness detection.
pub struct FairStrategy {
    inner: Box<dyn SchedulingStrategy>,
    fairness_threshold: u64,
    steps: u64,
    fair_flip: bool,
}

impl FairStrategy {
    pub fn new(inner: Box<dyn SchedulingStrategy>, fairness_threshold: u64) -> Self {
        Self {
            inner,
            fairness_threshold,
            steps: 0,
            fair_flip: false,
        }
    }

    fn past_threshold(&self) -> bool {
        self.steps > self.fairness_threshold
    }

    /// Round-robin: the enabled operation right after `current` in id
    /// order, wrapping around.
    fn round_robin(enabled: &[OperationId], current: OperationId) -> Option<OperationId> {
        let mut sorted: Vec<OperationId> = enabled.to_vec();
        sorted.sort_unstable();
        sorted
            .iter()
            .find(|op| **op > current)
            .or_else(|| sorted.first())
            .copied()
    }
}

impl SchedulingStrategy for FairStrategy {
    fn name(&self) -> String {
        format!("fair({})", self.inner.name())
    }

    fn next_operation(
        &mut self,
        enabled: &[OperationId],
        current: OperationId,
    ) -> Option<OperationId> {
        if enabled.is_empty() {
            return None;
        }
        self.steps += 1;
        if self.past_threshold() {
            if self.steps == self.fairness_threshold + 1 {
                trace!(steps = self.steps, "fairness threshold crossed, round-robin engaged");
            }
            return Self::round_robin(enabled, current);
        }
        self.inner.next_operation(enabled, current)
    }

    fn next_boolean(&mut self) -> bool {
        self.inner.next_boolean()
    }

    fn next_fair_boolean(&mut self) -> bool {
        if self.past_threshold() {
            self.fair_flip = !self.fair_flip;
            return self.fair_flip;
        }
        self.inner.next_boolean()
    }

    fn next_integer(&mut self, max_exclusive: u32) -> u32 {
        self.inner.next_integer(max_exclusive)
    }

    fn prepare_next_iteration(&mut self) -> bool {
        self.steps = 0;
        self.fair_flip = false;
        self.inner.prepare_next_iteration()
    }

    fn is_fair(&self) -> bool {
        true
    }
}
