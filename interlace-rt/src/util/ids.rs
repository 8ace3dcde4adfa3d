// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Unique identifier for actors within a runtime instance.
///
/// Carries the actor's short type name, an optional friendly name, and a
/// creation-sequence value. Equality is identity: two ids are equal exactly
/// when their sequence values are equal. Ids from different runtime
/// instances must not be mixed.
///
/// # Example
/// ```rust
/// use interlace_rt::util::ActorId;
///
/// let id = ActorId::new(7, "Node", None);
/// assert_eq!(format!("{id}"), "Node()");
///
/// let named = ActorId::new(8, "Node", Some("primary".into()));
/// assert_eq!(format!("{named}"), "Node(primary)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId {
    value: u64,
    type_name: Arc<str>,
    name: Option<Arc<str>>,
}

impl ActorId {
    /// Create an id with the given creation-sequence value and type tag.
    pub fn new(value: u64, type_name: impl Into<Arc<str>>, name: Option<Arc<str>>) -> Self {
        Self {
            value,
            type_name: type_name.into(),
            name,
        }
    }

    /// The creation-sequence value, unique within the runtime instance.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// The short type name of the actor this id was created for.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The friendly name, if one was supplied at creation.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialOrd for ActorId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name, self.name.as_deref().unwrap_or(""))
    }
}

/// The scheduler's unit of interleaving.
///
/// One operation exists per live actor and per live controlled task. The
/// value is the creation sequence, which makes recorded schedules canonical
/// across runs of the same program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(u64);

impl OperationId {
    /// The id of the root operation driving a test iteration.
    pub const ROOT: OperationId = OperationId(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op({})", self.0)
    }
}

/// Identifier for a timer owned by an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

impl TimerId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer({})", self.0)
    }
}
