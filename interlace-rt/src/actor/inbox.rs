//! Per-actor inboxes: ordered FIFO of event envelopes.
//!
//! Deferral is positional: a deferred event stays exactly where it is and
//! the scan continues past it, so when the deferring state is left the
//! previously deferred events become eligible in their original order.

// Layer 1: Standard library imports
use std::collections::VecDeque;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::event::{EventEnvelope, EventKey};

/// What the dispatch masks say about one queued event during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    /// Dequeue and dispatch this event.
    Take,
    /// Deferred: leave it queued, keep scanning.
    Skip,
    /// Ignored: consume it without dispatch, keep scanning.
    Discard,
}

/// Ordered event queue of one actor.
///
/// Enqueue is safe from any operation; observable order is FIFO per
/// (sender, receiver) pair because a sender's enqueues are themselves
/// serialized by the scheduler.
#[derive(Debug, Default)]
pub struct Inbox {
    queue: Mutex<VecDeque<EventEnvelope>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an envelope at the tail. Returns how many events of the same
    /// type were already queued, for instance-bound assertions.
    pub fn enqueue(&self, envelope: EventEnvelope) -> usize {
        let mut queue = self.queue.lock();
        let key = envelope.key();
        let existing = queue.iter().filter(|e| e.key() == key).count();
        queue.push_back(envelope);
        existing
    }

    /// Scan from the head applying the dispatch masks: take the first
    /// eligible event, dropping ignored ones along the way.
    pub fn dequeue_where(
        &self,
        mut resolve: impl FnMut(&EventEnvelope) -> FetchDecision,
    ) -> Option<EventEnvelope> {
        let mut queue = self.queue.lock();
        let mut index = 0;
        while index < queue.len() {
            match resolve(&queue[index]) {
                FetchDecision::Take => return queue.remove(index),
                FetchDecision::Skip => index += 1,
                FetchDecision::Discard => {
                    queue.remove(index);
                }
            }
        }
        None
    }

    /// Remove and return the first event matching one of the given keys,
    /// bypassing dispatch masks (explicit receive).
    pub fn take_matching(&self, keys: &[EventKey]) -> Option<EventEnvelope> {
        let mut queue = self.queue.lock();
        let position = queue.iter().position(|e| keys.contains(&e.key()))?;
        queue.remove(position)
    }

    pub fn has_matching(&self, keys: &[EventKey]) -> bool {
        self.queue.lock().iter().any(|e| keys.contains(&e.key()))
    }

    /// Remove every queued envelope (actor halt).
    pub fn drain(&self) -> Vec<EventEnvelope> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Names of queued events in order, for state hashing and diagnostics.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.queue.lock().iter().map(|e| e.event_name()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::{Event, EventEnvelope};

    #[derive(Debug)]
    struct Ping;
    impl Event for Ping {}

    #[derive(Debug)]
    struct Pong;
    impl Event for Pong {}

    fn env(event: impl Event) -> EventEnvelope {
        EventEnvelope::new(Box::new(event))
    }

    #[test]
    fn test_enqueue_reports_existing_instances() {
        let inbox = Inbox::new();
        assert_eq!(inbox.enqueue(env(Ping)), 0);
        assert_eq!(inbox.enqueue(env(Pong)), 0);
        assert_eq!(inbox.enqueue(env(Ping)), 1);
        assert_eq!(inbox.enqueue(env(Ping)), 2);
    }

    #[test]
    fn test_dequeue_takes_first_eligible() {
        let inbox = Inbox::new();
        inbox.enqueue(env(Ping));
        inbox.enqueue(env(Pong));

        let taken = inbox
            .dequeue_where(|e| {
                if e.key() == EventKey::of::<Pong>() {
                    FetchDecision::Take
                } else {
                    FetchDecision::Skip
                }
            })
            .unwrap();
        assert_eq!(taken.event_name(), "Pong");

        // The deferred Ping kept its place.
        assert_eq!(inbox.event_names(), vec!["Ping"]);
    }

    #[test]
    fn test_deferred_events_keep_original_order() {
        let inbox = Inbox::new();
        inbox.enqueue(env(Ping));
        inbox.enqueue(env(Ping));
        inbox.enqueue(env(Pong));

        // Defer all Pings, take the Pong.
        inbox.dequeue_where(|e| {
            if e.key() == EventKey::of::<Ping>() {
                FetchDecision::Skip
            } else {
                FetchDecision::Take
            }
        });

        // Once the mask lifts, the Pings come out in their original order.
        let first = inbox.dequeue_where(|_| FetchDecision::Take).unwrap();
        assert_eq!(first.event_name(), "Ping");
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn test_discard_consumes_without_dispatch() {
        let inbox = Inbox::new();
        inbox.enqueue(env(Ping));
        inbox.enqueue(env(Pong));

        let taken = inbox
            .dequeue_where(|e| {
                if e.key() == EventKey::of::<Ping>() {
                    FetchDecision::Discard
                } else {
                    FetchDecision::Take
                }
            })
            .unwrap();
        assert_eq!(taken.event_name(), "Pong");
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_take_matching_bypasses_order() {
        let inbox = Inbox::new();
        inbox.enqueue(env(Ping));
        inbox.enqueue(env(Pong));

        let taken = inbox.take_matching(&[EventKey::of::<Pong>()]).unwrap();
        assert_eq!(taken.event_name(), "Pong");
        assert!(inbox.take_matching(&[EventKey::of::<Pong>()]).is_none());
        assert!(inbox.has_matching(&[EventKey::of::<Ping>()]));
    }

    #[test]
    fn test_drain_returns_everything() {
        let inbox = Inbox::new();
        inbox.enqueue(env(Ping));
        inbox.enqueue(env(Pong));
        let drained = inbox.drain();
        assert_eq!(drained.len(), 2);
        assert!(inbox.is_empty());
    }
}
