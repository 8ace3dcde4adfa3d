//! The `Monitor` trait and its restricted context.
//!
//! Monitors are specification-only state machines: not schedulable, not
//! addressable, no inbox. Events are delivered synchronously by whichever
//! actor invokes the monitor, and the monitor runs to quiescence (any
//! number of raises and gotos) before the caller continues. Monitor steps
//! are not scheduling points. Monitors may not send events or create
//! actors, which is why this context exposes neither.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::table::{ActionId, MachineTable, TableError};
use crate::actor::traits::HandlerResult;
use crate::event::Event;
use crate::runtime::errors::RuntimeError;

/// A specification monitor: a declarative table with hot/cold markers plus
/// token-dispatched synchronous actions.
///
/// States marked [`hot`](crate::actor::table::State::hot) must eventually
/// be left; the liveness checker tracks how long each monitor stays hot.
pub trait Monitor: Send + 'static {
    /// The monitor's state table.
    fn table() -> Result<MachineTable, TableError>
    where
        Self: Sized;

    /// Run the action named by `action`. Synchronous by design: monitors
    /// cannot await, send, or create.
    fn execute(
        &mut self,
        action: ActionId,
        event: Option<&dyn Event>,
        ctx: &mut MonitorContext,
    ) -> HandlerResult;

    /// User contribution to the cycle-detection state hash.
    fn hashed_state(&self) -> u64 {
        0
    }
}

/// Control-flow request recorded by a monitor action.
#[derive(Debug)]
pub(crate) enum MonitorControl {
    Raise(Box<dyn Event>),
    Goto(&'static str),
}

/// Restricted context for monitor actions: raise, goto, and assert only.
pub struct MonitorContext {
    name: String,
    current_state: &'static str,
    pending: Option<MonitorControl>,
    error: Option<RuntimeError>,
    in_exit: bool,
}

impl MonitorContext {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            current_state: "",
            pending: None,
            error: None,
            in_exit: false,
        }
    }

    /// The monitor's short type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the current monitor state.
    pub fn current_state(&self) -> &'static str {
        self.current_state
    }

    /// Raise an event against the monitor's own table, processed before
    /// the invoking actor continues.
    pub fn raise_event(&mut self, event: impl Event) {
        self.request(MonitorControl::Raise(Box::new(event)));
    }

    /// Transition to another monitor state.
    pub fn goto_state(&mut self, state: &'static str) {
        self.request(MonitorControl::Goto(state));
    }

    /// Fail the iteration with `AssertionFailure` when `condition` is false.
    pub fn assert(&mut self, condition: bool, message: impl Into<String>) {
        if !condition && self.error.is_none() {
            self.error = Some(RuntimeError::AssertionFailure(message.into()));
        }
    }

    fn request(&mut self, control: MonitorControl) {
        if self.error.is_some() {
            return;
        }
        if self.in_exit {
            self.error = Some(RuntimeError::TransitionInOnExit {
                actor: self.name.clone(),
            });
            return;
        }
        if self.pending.is_some() {
            self.error = Some(RuntimeError::MultipleTransitions {
                actor: self.name.clone(),
            });
            return;
        }
        self.pending = Some(control);
    }

    pub(crate) fn take_pending(&mut self) -> Option<MonitorControl> {
        self.pending.take()
    }

    pub(crate) fn take_error(&mut self) -> Option<RuntimeError> {
        self.error.take()
    }

    pub(crate) fn set_current_state(&mut self, state: &'static str) {
        self.current_state = state;
    }

    pub(crate) fn enter_exit_scope(&mut self) {
        self.in_exit = true;
    }

    pub(crate) fn leave_exit_scope(&mut self) {
        self.in_exit = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::UnitEvent;

    #[test]
    fn test_assert_records_first_failure() {
        let mut ctx = MonitorContext::new("Safety".to_string());
        ctx.assert(true, "fine");
        assert!(ctx.take_error().is_none());

        ctx.assert(false, "first");
        ctx.assert(false, "second");
        assert_eq!(
            ctx.take_error().unwrap(),
            RuntimeError::AssertionFailure("first".to_string())
        );
    }

    #[test]
    fn test_double_transition_is_flagged() {
        let mut ctx = MonitorContext::new("Safety".to_string());
        ctx.goto_state("A");
        ctx.raise_event(UnitEvent);
        assert!(matches!(
            ctx.take_error(),
            Some(RuntimeError::MultipleTransitions { .. })
        ));
    }

    #[test]
    fn test_transition_in_exit_is_flagged() {
        let mut ctx = MonitorContext::new("Safety".to_string());
        ctx.enter_exit_scope();
        ctx.goto_state("A");
        assert!(matches!(
            ctx.take_error(),
            Some(RuntimeError::TransitionInOnExit { .. })
        ));
    }
}
