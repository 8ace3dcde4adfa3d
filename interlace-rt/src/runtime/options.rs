//! Options for sends and actor creations.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::event::Event;
use crate::group::EventGroup;
use crate::util::ActorId;

/// How an event group propagates along a send or creation.
#[derive(Debug, Clone, Default)]
pub enum GroupChoice {
    /// Use the sender's current group (or the creator's, for creations).
    #[default]
    Inherit,
    /// Attach this specific group.
    Assign(EventGroup),
    /// Attach no group, disabling propagation.
    Clear,
}

impl GroupChoice {
    /// Resolve against the inherited group.
    pub(crate) fn resolve(self, inherited: Option<&EventGroup>) -> Option<EventGroup> {
        match self {
            GroupChoice::Inherit => inherited.cloned(),
            GroupChoice::Assign(group) => Some(group),
            GroupChoice::Clear => None,
        }
    }
}

/// Options for `send_event_with`.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub group: GroupChoice,
    /// Assert that at most this many instances of the event type are
    /// already queued at the receiver.
    pub max_instances: Option<u32>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: EventGroup) -> Self {
        self.group = GroupChoice::Assign(group);
        self
    }

    pub fn without_group(mut self) -> Self {
        self.group = GroupChoice::Clear;
        self
    }

    pub fn with_max_instances(mut self, limit: u32) -> Self {
        self.max_instances = Some(limit);
        self
    }
}

/// Options for actor and machine creation.
#[derive(Debug, Default)]
pub struct CreateOptions {
    /// Friendly name carried in the actor id.
    pub name: Option<String>,
    /// Bind to this pre-created id instead of a fresh one.
    pub id: Option<ActorId>,
    /// Event delivered ahead of anything else after initialization.
    pub initial_event: Option<Box<dyn Event>>,
    pub group: GroupChoice,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: ActorId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_initial_event(mut self, event: impl Event) -> Self {
        self.initial_event = Some(Box::new(event));
        self
    }

    pub fn with_group(mut self, group: EventGroup) -> Self {
        self.group = GroupChoice::Assign(group);
        self
    }

    pub fn without_group(mut self) -> Self {
        self.group = GroupChoice::Clear;
        self
    }
}
