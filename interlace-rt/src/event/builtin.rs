//! Events synthesized by the runtime itself.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::traits::Event;
use crate::util::{ActorId, TimerId};

/// Halts the receiving actor when dequeued.
///
/// Raising `HaltEvent` from inside a handler halts the actor immediately
/// after the handler returns; sending it halts the actor when the event
/// reaches the head of the inbox.
#[derive(Debug)]
pub struct HaltEvent;

impl Event for HaltEvent {}

/// Synthesized when an actor's inbox is empty and the current state chain
/// declares a default handler.
#[derive(Debug)]
pub struct DefaultEvent;

impl Event for DefaultEvent {}

/// Carries no payload; convenience for signalling.
#[derive(Debug)]
pub struct UnitEvent;

impl Event for UnitEvent {}

/// Delivered to a timer's owner when the scheduler decides the timer fired.
///
/// Under controlled execution the firing instant is a scheduling choice;
/// the `due` and `period` fields describe the logical timer, not wall-clock
/// time.
#[derive(Debug)]
pub struct TimerElapsedEvent {
    pub info: TimerInfo,
}

impl Event for TimerElapsedEvent {}

/// Description of a started timer.
#[derive(Debug, Clone)]
pub struct TimerInfo {
    pub id: TimerId,
    pub owner: ActorId,
    pub due: Duration,
    /// `Some` for periodic timers, `None` for one-shot.
    pub period: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_event_names() {
        assert_eq!(HaltEvent.name(), "HaltEvent");
        assert_eq!(DefaultEvent.name(), "DefaultEvent");
        assert_eq!(UnitEvent.name(), "UnitEvent");
    }

    #[test]
    fn test_timer_elapsed_carries_info() {
        let info = TimerInfo {
            id: TimerId::new(1),
            owner: ActorId::new(2, "Node", None),
            due: Duration::from_millis(10),
            period: None,
        };
        let event = TimerElapsedEvent { info: info.clone() };
        assert_eq!(event.name(), "TimerElapsedEvent");
        assert_eq!(event.info.id, TimerId::new(1));
        assert!(event.info.period.is_none());
    }
}
