//! Actor and state-machine runtime: traits, tables, inboxes, dispatch.

pub mod context;
pub(crate) mod host;
pub mod inbox;
pub mod lifecycle;
pub mod table;
pub mod traits;

pub use context::ActorContext;
pub use inbox::{FetchDecision, Inbox};
pub use lifecycle::ActorStatus;
pub use table::{ActionId, Handle, MachineTable, MachineTableBuilder, Resolution, State, TableError, Temperature};
pub use traits::{Actor, ExceptionOutcome, HandlerError, HandlerResult, StateMachine};
