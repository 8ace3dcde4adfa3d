//! Verbatim replay of a recorded schedule.

// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use tracing::warn;

// Layer 3: Internal module imports
use super::traits::SchedulingStrategy;
use crate::schedule::{Decision, Schedule};
use crate::util::OperationId;

/// The first point where a replayed execution stopped matching its trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Zero-based index into the decision trace.
    pub step: usize,
    pub expected: String,
    pub actual: String,
}

impl Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {}: expected {}, got {}",
            self.step, self.expected, self.actual
        )
    }
}

/// Re-drives the scheduler with the decisions of a recorded schedule.
///
/// Replay is strict: a decision of the wrong kind, an operation that is no
/// longer enabled, a value out of range, or running off the end of the
/// trace all record a [`Divergence`] and stop the replay. The scheduler
/// surfaces the divergence as a fatal error.
pub struct ReplayStrategy {
    schedule: Schedule,
    cursor: usize,
    divergence: Option<Divergence>,
    started: bool,
}

impl ReplayStrategy {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            cursor: 0,
            divergence: None,
            started: false,
        }
    }

    /// The seed recorded in the replayed trace's header.
    pub fn recorded_seed(&self) -> u64 {
        self.schedule.seed
    }

    fn diverge(&mut self, expected: impl Into<String>, actual: impl Into<String>) {
        if self.divergence.is_none() {
            let divergence = Divergence {
                step: self.cursor,
                expected: expected.into(),
                actual: actual.into(),
            };
            warn!(%divergence, "replay diverged");
            self.divergence = Some(divergence);
        }
    }

    fn next_decision(&mut self, wanted: &str) -> Option<Decision> {
        if self.divergence.is_some() {
            return None;
        }
        match self.schedule.steps().get(self.cursor) {
            Some(step) => Some(step.decision.clone()),
            None => {
                self.diverge(format!("a {wanted} decision"), "end of schedule");
                None
            }
        }
    }
}

impl SchedulingStrategy for ReplayStrategy {
    fn name(&self) -> String {
        format!("replay({})", self.schedule.strategy)
    }

    fn next_operation(
        &mut self,
        enabled: &[OperationId],
        _current: OperationId,
    ) -> Option<OperationId> {
        let decision = self.next_decision("scheduling")?;
        match decision {
            Decision::Operation(op) if enabled.contains(&op) => {
                self.cursor += 1;
                Some(op)
            }
            Decision::Operation(op) => {
                let actual: Vec<String> = enabled.iter().map(ToString::to_string).collect();
                self.diverge(op.to_string(), format!("enabled {{{}}}", actual.join(", ")));
                None
            }
            other => {
                self.diverge("an operation decision", other.to_string());
                None
            }
        }
    }

    fn next_boolean(&mut self) -> bool {
        match self.next_decision("boolean") {
            Some(Decision::Boolean(b)) => {
                self.cursor += 1;
                b
            }
            Some(other) => {
                self.diverge("a boolean decision", other.to_string());
                false
            }
            None => false,
        }
    }

    fn next_fair_boolean(&mut self) -> bool {
        match self.next_decision("fair boolean") {
            Some(Decision::FairBoolean(b)) => {
                self.cursor += 1;
                b
            }
            Some(other) => {
                self.diverge("a fair boolean decision", other.to_string());
                false
            }
            None => false,
        }
    }

    fn next_integer(&mut self, max_exclusive: u32) -> u32 {
        match self.next_decision("integer") {
            Some(Decision::Integer(v)) if v < max_exclusive.max(1) => {
                self.cursor += 1;
                v
            }
            Some(Decision::Integer(v)) => {
                self.diverge(
                    format!("an integer below {max_exclusive}"),
                    format!("recorded {v}"),
                );
                0
            }
            Some(other) => {
                self.diverge("an integer decision", other.to_string());
                0
            }
            None => 0,
        }
    }

    fn prepare_next_iteration(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        true
    }

    fn is_fair(&self) -> bool {
        false
    }

    fn divergence(&self) -> Option<Divergence> {
        self.divergence.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn trace(decisions: Vec<Decision>) -> Schedule {
        let mut s = Schedule::new("random", 0);
        for d in decisions {
            s.push(d, None);
        }
        s
    }

    fn ops(values: &[u64]) -> Vec<OperationId> {
        values.iter().copied().map(OperationId::new).collect()
    }

    #[test]
    fn test_replays_decisions_in_order() {
        let mut s = ReplayStrategy::new(trace(vec![
            Decision::Operation(OperationId::new(1)),
            Decision::Boolean(true),
            Decision::Integer(2),
        ]));
        assert!(s.prepare_next_iteration());
        assert_eq!(
            s.next_operation(&ops(&[0, 1]), OperationId::ROOT),
            Some(OperationId::new(1))
        );
        assert!(s.next_boolean());
        assert_eq!(s.next_integer(5), 2);
        assert!(s.divergence().is_none());
    }

    #[test]
    fn test_operation_not_enabled_diverges() {
        let mut s = ReplayStrategy::new(trace(vec![Decision::Operation(OperationId::new(9))]));
        s.prepare_next_iteration();
        assert_eq!(s.next_operation(&ops(&[0, 1]), OperationId::ROOT), None);
        let d = s.divergence().unwrap();
        assert_eq!(d.step, 0);
        assert!(d.expected.contains("op(9)"));
    }

    #[test]
    fn test_decision_kind_mismatch_diverges() {
        let mut s = ReplayStrategy::new(trace(vec![Decision::Boolean(true)]));
        s.prepare_next_iteration();
        assert_eq!(s.next_operation(&ops(&[0]), OperationId::ROOT), None);
        assert!(s.divergence().is_some());
    }

    #[test]
    fn test_trace_exhaustion_diverges() {
        let mut s = ReplayStrategy::new(trace(vec![]));
        s.prepare_next_iteration();
        assert_eq!(s.next_operation(&ops(&[0]), OperationId::ROOT), None);
        assert!(s.divergence().unwrap().actual.contains("end of schedule"));
    }

    #[test]
    fn test_integer_out_of_range_diverges() {
        let mut s = ReplayStrategy::new(trace(vec![Decision::Integer(7)]));
        s.prepare_next_iteration();
        assert_eq!(s.next_integer(3), 0);
        assert!(s.divergence().is_some());
    }

    #[test]
    fn test_single_iteration_only() {
        let mut s = ReplayStrategy::new(trace(vec![]));
        assert!(s.prepare_next_iteration());
        assert!(!s.prepare_next_iteration());
    }

    #[test]
    fn test_first_divergence_is_kept() {
        let mut s = ReplayStrategy::new(trace(vec![Decision::Boolean(true)]));
        s.prepare_next_iteration();
        s.next_operation(&ops(&[0]), OperationId::ROOT);
        let first = s.divergence().unwrap();
        s.next_integer(3);
        assert_eq!(s.divergence().unwrap(), first);
    }
}
