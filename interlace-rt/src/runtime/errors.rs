//! The user-facing error taxonomy of the testing runtime.
//!
//! Every bug found by systematic testing surfaces as a [`RuntimeError`].
//! Message texts are stable enough for golden-test assertions and follow
//! the grammar `"<actor-id> <specific reason>"` where an actor is involved.

// Layer 1: Standard library
use std::fmt::{self, Display};

// Layer 2: Third-party
use thiserror::Error;

// Layer 3: Internal
use crate::util::ActorId;

/// Errors detected during a controlled execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A user-visible specification check failed.
    #[error("{0}")]
    AssertionFailure(String),

    /// An actor dequeued an event with no handler in the current state chain.
    #[error("{actor} received event '{event}' that cannot be handled")]
    UnhandledEvent { actor: String, event: String },

    /// A send with an instance bound found too many copies queued already.
    #[error("There are more than {limit} instances of '{event}' in the input queue of machine '{receiver}'")]
    MaxInstancesExceeded {
        receiver: String,
        event: String,
        limit: u32,
    },

    /// Goto or push named a state the machine never declared.
    #[error("{actor} cannot transition to undeclared state '{target}'")]
    InvalidTransition { actor: String, target: String },

    /// More than one raise/goto/push/pop in the same handler invocation.
    #[error("{actor} performed more than one raise, goto, push or pop in the same handler")]
    MultipleTransitions { actor: String },

    /// A send following a raise/goto/push/pop in the same handler.
    #[error("{actor} sent an event after a transition in the same handler")]
    SendAfterTransition { actor: String },

    /// A transition call inside an exit action.
    #[error("{actor} invoked a transition inside an exit action")]
    TransitionInOnExit { actor: String },

    /// Send to an id that was never bound or whose actor halted.
    #[error("cannot send event to unbound actor id '{0}'")]
    UnboundActor(ActorId),

    /// An id created for one actor type was bound with another.
    #[error("actor id '{id}' was created for type '{expected}' but bound to '{actual}'")]
    TypeMismatch {
        id: ActorId,
        expected: String,
        actual: String,
    },

    /// An id was re-bound before its previous actor fully halted.
    #[error("actor id '{0}' is already bound to a live actor")]
    ActorIdReuse(ActorId),

    /// No operation is enabled but live operations remain blocked.
    #[error("deadlock detected: {0}")]
    Deadlock(DeadlockInfo),

    /// A monitor stayed too hot for too long under a fair schedule.
    #[error("monitor '{monitor}' detected potential liveness bug in hot state '{state}'")]
    LivenessViolation { monitor: String, state: String },

    /// The program state repeated while some monitor was hot.
    #[error("monitor '{monitor}' detected an infinite execution that repeats a program state while in hot state '{state}'")]
    LivenessCycle { monitor: String, state: String },

    /// A monitor was hot when the program ended.
    #[error("monitor '{monitor}' was in hot state '{state}' at the end of the program")]
    LivenessEndOfProgram { monitor: String, state: String },

    /// A replayed execution stopped matching its recorded trace.
    #[error("replay diverged at {divergence}")]
    ReplayDivergence { divergence: String },

    /// A handler failed and the actor's exception policy escalated it.
    #[error("{actor} handler failed: {message}")]
    HandlerFailure { actor: String, message: String },

    /// A strategy broke its contract.
    #[error("strategy error: {0}")]
    StrategyBug(String),

    /// Configuration rejected before any execution.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RuntimeError {
    /// Whether this error is a liveness-property violation.
    pub fn is_liveness(&self) -> bool {
        matches!(
            self,
            RuntimeError::LivenessViolation { .. }
                | RuntimeError::LivenessCycle { .. }
                | RuntimeError::LivenessEndOfProgram { .. }
        )
    }

    /// Whether this error is a safety-property violation found in user code
    /// (as opposed to liveness, replay, or harness errors).
    pub fn is_safety(&self) -> bool {
        !self.is_liveness()
            && !matches!(
                self,
                RuntimeError::ReplayDivergence { .. }
                    | RuntimeError::StrategyBug(_)
                    | RuntimeError::Configuration(_)
            )
    }
}

/// The blocked operations at a deadlock, with their wait reasons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeadlockInfo {
    pub blocked: Vec<BlockedOperation>,
}

/// One blocked operation in a deadlock report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedOperation {
    pub operation: String,
    pub reason: String,
}

impl Display for DeadlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for b in &self.blocked {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{} is waiting on {}", b.operation, b.reason)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unhandled_event_message() {
        let err = RuntimeError::UnhandledEvent {
            actor: "N5()".to_string(),
            event: "E3".to_string(),
        };
        assert!(err
            .to_string()
            .contains("received event 'E3' that cannot be handled"));
    }

    #[test]
    fn test_max_instances_message() {
        let err = RuntimeError::MaxInstancesExceeded {
            receiver: "N()".to_string(),
            event: "E1".to_string(),
            limit: 1,
        };
        assert_eq!(
            err.to_string(),
            "There are more than 1 instances of 'E1' in the input queue of machine 'N()'"
        );
    }

    #[test]
    fn test_assertion_message_is_verbatim() {
        let err = RuntimeError::AssertionFailure("Value is 1 instead of 0".to_string());
        assert_eq!(err.to_string(), "Value is 1 instead of 0");
    }

    #[test]
    fn test_deadlock_message_lists_blocked_operations() {
        let err = RuntimeError::Deadlock(DeadlockInfo {
            blocked: vec![
                BlockedOperation {
                    operation: "Node()".to_string(),
                    reason: "a receive".to_string(),
                },
                BlockedOperation {
                    operation: "op(3)".to_string(),
                    reason: "a lock".to_string(),
                },
            ],
        });
        let text = err.to_string();
        assert!(text.starts_with("deadlock detected: "));
        assert!(text.contains("Node() is waiting on a receive"));
        assert!(text.contains("op(3) is waiting on a lock"));
    }

    #[test]
    fn test_liveness_classification() {
        let liveness = RuntimeError::LivenessEndOfProgram {
            monitor: "Progress".to_string(),
            state: "Busy".to_string(),
        };
        assert!(liveness.is_liveness());
        assert!(!liveness.is_safety());

        let safety = RuntimeError::AssertionFailure("bad".to_string());
        assert!(safety.is_safety());
        assert!(!safety.is_liveness());

        let harness = RuntimeError::StrategyBug("oops".to_string());
        assert!(!harness.is_safety());
        assert!(!harness.is_liveness());
    }
}
