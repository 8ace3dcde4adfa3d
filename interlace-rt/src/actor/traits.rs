//! The `Actor` and `StateMachine` traits.
//!
//! A `StateMachine` publishes a declarative state table and receives its
//! action dispatches through a single `execute` method keyed by
//! [`ActionId`]. An `Actor` is the uniform special case: every event goes
//! to `handle_event` and there is exactly one implicit state.

// Layer 1: Standard library imports
use std::error::Error;
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::context::ActorContext;
use super::table::{ActionId, Handle, MachineTable, State, TableError};
use crate::event::Event;

/// Failure returned by a handler action.
///
/// Handler failures are routed through the actor's exception policy: they
/// either halt the actor or fail the whole iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result of one handler action.
pub type HandlerResult = Result<(), HandlerError>;

/// What to do with a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionOutcome {
    /// The failure is contained: halt this actor only.
    HandledException,
    /// Escalate: fail the whole iteration.
    ThrowException,
}

/// A state machine: a declarative table plus token-dispatched actions.
///
/// # Example
///
/// ```rust,ignore
/// struct Door { open_count: u32 }
///
/// #[async_trait]
/// impl StateMachine for Door {
///     fn table() -> Result<MachineTable, TableError> {
///         MachineTable::builder()
///             .state(
///                 State::new("Closed")
///                     .initial()
///                     .when::<Open>(Handle::goto_state("Opened")),
///             )
///             .state(
///                 State::new("Opened")
///                     .on_entry("count_open")
///                     .when::<Close>(Handle::goto_state("Closed")),
///             )
///             .build()
///     }
///
///     async fn execute(
///         &mut self,
///         action: ActionId,
///         _event: Option<&dyn Event>,
///         _ctx: &mut ActorContext,
///     ) -> HandlerResult {
///         match action {
///             "count_open" => {
///                 self.open_count += 1;
///                 Ok(())
///             }
///             _ => Ok(()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait StateMachine: Send + 'static {
    /// The machine's state table, built once per instance at creation.
    fn table() -> Result<MachineTable, TableError>
    where
        Self: Sized;

    /// Run the action named by `action`. `event` is the triggering event
    /// for event handlers and entry actions reached through a transition;
    /// it is `None` for the start state's entry.
    async fn execute(
        &mut self,
        action: ActionId,
        event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult;

    /// Cleanup hook invoked when the machine halts.
    async fn on_halt(&mut self, _ctx: &mut ActorContext) -> HandlerResult {
        Ok(())
    }

    /// Decide whether a handler failure is contained or fails the test.
    fn on_exception(&self, _error: &HandlerError) -> ExceptionOutcome {
        ExceptionOutcome::ThrowException
    }

    /// User contribution to the cycle-detection state hash.
    fn hashed_state(&self) -> u64 {
        0
    }
}

/// A uniform actor: one implicit state, every event to `handle_event`.
#[async_trait]
pub trait Actor: Send + 'static {
    /// Initialization hook, run before any event is dequeued.
    async fn on_init(&mut self, _ctx: &mut ActorContext) -> HandlerResult {
        Ok(())
    }

    /// Process one dequeued event.
    async fn handle_event(&mut self, event: &dyn Event, ctx: &mut ActorContext) -> HandlerResult;

    /// Cleanup hook invoked when the actor halts.
    async fn on_halt(&mut self, _ctx: &mut ActorContext) -> HandlerResult {
        Ok(())
    }

    /// Decide whether a handler failure is contained or fails the test.
    fn on_exception(&self, _error: &HandlerError) -> ExceptionOutcome {
        ExceptionOutcome::ThrowException
    }

    /// User contribution to the cycle-detection state hash.
    fn hashed_state(&self) -> u64 {
        0
    }
}

/// The single implicit state of a uniform actor.
pub(crate) const UNIFORM_STATE: &str = "Listening";
pub(crate) const ACTION_INIT: ActionId = "@init";
pub(crate) const ACTION_HANDLE: ActionId = "@handle";

/// Internal erasure over `Actor` and `StateMachine` so the host runs one
/// dispatch loop for both.
#[async_trait]
pub(crate) trait Behavior: Send {
    fn build_table(&self) -> Result<MachineTable, TableError>;

    async fn execute(
        &mut self,
        action: ActionId,
        event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult;

    async fn on_halt(&mut self, ctx: &mut ActorContext) -> HandlerResult;

    fn on_exception(&self, error: &HandlerError) -> ExceptionOutcome;

    fn hashed_state(&self) -> u64;
}

pub(crate) struct MachineBehavior<M: StateMachine>(pub M);

#[async_trait]
impl<M: StateMachine> Behavior for MachineBehavior<M> {
    fn build_table(&self) -> Result<MachineTable, TableError> {
        M::table()
    }

    async fn execute(
        &mut self,
        action: ActionId,
        event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult {
        self.0.execute(action, event, ctx).await
    }

    async fn on_halt(&mut self, ctx: &mut ActorContext) -> HandlerResult {
        self.0.on_halt(ctx).await
    }

    fn on_exception(&self, error: &HandlerError) -> ExceptionOutcome {
        self.0.on_exception(error)
    }

    fn hashed_state(&self) -> u64 {
        self.0.hashed_state()
    }
}

pub(crate) struct UniformBehavior<A: Actor>(pub A);

#[async_trait]
impl<A: Actor> Behavior for UniformBehavior<A> {
    fn build_table(&self) -> Result<MachineTable, TableError> {
        MachineTable::single(
            State::new(UNIFORM_STATE)
                .on_entry(ACTION_INIT)
                .when_any(Handle::Action(ACTION_HANDLE)),
        )
    }

    async fn execute(
        &mut self,
        action: ActionId,
        event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult {
        match action {
            ACTION_INIT => self.0.on_init(ctx).await,
            ACTION_HANDLE => match event {
                Some(event) => self.0.handle_event(event, ctx).await,
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    async fn on_halt(&mut self, ctx: &mut ActorContext) -> HandlerResult {
        self.0.on_halt(ctx).await
    }

    fn on_exception(&self, error: &HandlerError) -> ExceptionOutcome {
        self.0.on_exception(error)
    }

    fn hashed_state(&self) -> u64 {
        self.0.hashed_state()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::new("connection refused");
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn test_handler_error_from_str() {
        let err: HandlerError = "boom".into();
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn test_uniform_behavior_table_shape() {
        struct Quiet;

        #[async_trait]
        impl Actor for Quiet {
            async fn handle_event(
                &mut self,
                _event: &dyn Event,
                _ctx: &mut ActorContext,
            ) -> HandlerResult {
                Ok(())
            }
        }

        let behavior = UniformBehavior(Quiet);
        let table = behavior.build_table().unwrap();
        assert_eq!(table.start_state(), UNIFORM_STATE);
        // No explicit default handler: uniform actors must not busy-spin.
        assert!(!table.has_default_handler(&[UNIFORM_STATE]));
    }
}
