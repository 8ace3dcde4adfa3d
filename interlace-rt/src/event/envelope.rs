//! Inbox entries: an event tagged with its sender and event group.

// Layer 1: Standard library imports
use std::fmt::{self, Debug};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::traits::{Event, EventKey};
use crate::group::EventGroup;
use crate::util::ActorId;

/// An event queued in an actor inbox, tagged with sender and group.
///
/// Inbox order is FIFO per (sender, receiver) pair; the envelope keeps the
/// sender so that ordering diagnostics and coverage can attribute events.
pub struct EventEnvelope {
    pub event: Box<dyn Event>,
    pub sender: Option<ActorId>,
    pub group: Option<EventGroup>,
}

impl EventEnvelope {
    pub fn new(event: Box<dyn Event>) -> Self {
        Self {
            event,
            sender: None,
            group: None,
        }
    }

    pub fn with_sender(mut self, sender: ActorId) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_group(mut self, group: Option<EventGroup>) -> Self {
        self.group = group;
        self
    }

    /// Dispatch key of the enclosed event.
    pub fn key(&self) -> EventKey {
        self.event.key()
    }

    /// Short name of the enclosed event.
    pub fn event_name(&self) -> &'static str {
        self.event.name()
    }
}

impl Debug for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("event", &self.event)
            .field("sender", &self.sender)
            .field("group", &self.group)
            .finish()
    }
}
