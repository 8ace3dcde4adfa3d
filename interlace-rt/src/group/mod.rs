//! Event groups: context propagated through sends and creations.

pub mod awaitable;

pub use awaitable::{AwaitableEventGroup, EventGroupCounter};

// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Context identity threaded through event sends and actor creations.
///
/// A group propagates along sends unless a send explicitly replaces it or
/// clears it with `None`. The group observed by an actor while handling an
/// event equals the group attached to the dequeued event, or the group
/// inherited at creation when the event carried none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventGroup {
    id: Uuid,
    name: Option<Arc<str>>,
}

impl EventGroup {
    /// Create an anonymous group with fresh identity.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
        }
    }

    /// Create a named group with fresh identity.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: Some(name.into()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Default for EventGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EventGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}@{}", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}
