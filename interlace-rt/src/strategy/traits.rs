//! The strategy seam between the scheduler and exploration heuristics.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::replay::Divergence;
use crate::util::OperationId;

/// Chooses the next operation and nondeterministic values at each
/// scheduling point.
///
/// # Contract
///
/// `next_operation` must return an operation drawn from `enabled`.
/// Returning `None` while `enabled` is non-empty is a strategy bug, except
/// for the replay strategy, which signals divergence through
/// [`divergence`](Self::divergence).
///
/// A strategy lives across iterations: [`prepare_next_iteration`]
/// (Self::prepare_next_iteration) is called before every iteration
/// (including the first) and returns `false` once the search space is
/// exhausted.
pub trait SchedulingStrategy: Send {
    /// Human-readable name recorded in schedule trace headers.
    fn name(&self) -> String;

    /// Pick the next operation to run from the enabled set.
    fn next_operation(
        &mut self,
        enabled: &[OperationId],
        current: OperationId,
    ) -> Option<OperationId>;

    /// Resolve a nondeterministic boolean choice.
    fn next_boolean(&mut self) -> bool;

    /// Resolve a nondeterministic boolean choice under fairness.
    ///
    /// Fair strategies guarantee both outcomes keep occurring across an
    /// unbounded execution; the default delegates to `next_boolean`.
    fn next_fair_boolean(&mut self) -> bool {
        self.next_boolean()
    }

    /// Resolve a nondeterministic integer choice in `[0, max_exclusive)`.
    fn next_integer(&mut self, max_exclusive: u32) -> u32;

    /// Advance to the next iteration; `false` when exploration is done.
    fn prepare_next_iteration(&mut self) -> bool;

    /// Whether this strategy is fair in the liveness-checking sense: every
    /// continually-enabled operation is eventually selected.
    fn is_fair(&self) -> bool;

    /// The replay divergence, when this strategy is a replay that failed.
    fn divergence(&self) -> Option<Divergence> {
        None
    }
}
