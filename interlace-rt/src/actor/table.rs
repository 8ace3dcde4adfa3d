//! Declarative state tables.
//!
//! A machine publishes its behavior as a table of state declarations built
//! at registration time: entry/exit action tokens plus a handler map keyed
//! by event type tokens. The runtime interprets the table; actions are
//! dispatched back to the machine through its `execute` method by
//! [`ActionId`]. No reflection, no attribute scanning.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::event::{DefaultEvent, Event, EventKey};

/// Token naming an action method of a machine.
///
/// The machine's `execute` matches on this token and runs the
/// corresponding method.
pub type ActionId = &'static str;

/// Temperature marker for monitor states.
///
/// Hot states must eventually be left; cold states represent recovered
/// conditions. Ordinary machines leave every state neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Temperature {
    #[default]
    Neutral,
    Hot,
    Cold,
}

/// What to do when an event type reaches the head of the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handle {
    /// Run an action method.
    Action(ActionId),
    /// Exit the current state and enter the named state.
    Goto(&'static str),
    /// Enter the named state on top of the current one, without exiting.
    Push(&'static str),
    /// Consume the event without running anything.
    Ignore,
    /// Leave the event queued until the declaring state is left.
    Defer,
}

impl Handle {
    pub fn action(id: ActionId) -> Self {
        Handle::Action(id)
    }

    pub fn goto_state(state: &'static str) -> Self {
        Handle::Goto(state)
    }

    pub fn push_state(state: &'static str) -> Self {
        Handle::Push(state)
    }
}

/// Declaration of one state: entry/exit actions and per-event handlers.
#[derive(Debug, Clone)]
pub struct State {
    name: &'static str,
    initial: bool,
    temperature: Temperature,
    entry: Option<ActionId>,
    exit: Option<ActionId>,
    handlers: HashMap<EventKey, Handle>,
    wildcard: Option<Handle>,
}

impl State {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            initial: false,
            temperature: Temperature::Neutral,
            entry: None,
            exit: None,
            handlers: HashMap::new(),
            wildcard: None,
        }
    }

    /// Mark this state as the machine's start state.
    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    /// Mark this monitor state hot: it must eventually be left.
    pub fn hot(mut self) -> Self {
        self.temperature = Temperature::Hot;
        self
    }

    /// Mark this monitor state cold: a recovered condition.
    pub fn cold(mut self) -> Self {
        self.temperature = Temperature::Cold;
        self
    }

    pub fn on_entry(mut self, action: ActionId) -> Self {
        self.entry = Some(action);
        self
    }

    pub fn on_exit(mut self, action: ActionId) -> Self {
        self.exit = Some(action);
        self
    }

    /// Declare how events of type `E` are handled in this state.
    pub fn when<E: Event>(mut self, handle: Handle) -> Self {
        self.handlers.insert(EventKey::of::<E>(), handle);
        self
    }

    /// Consume events of type `E` without running anything.
    pub fn ignore<E: Event>(self) -> Self {
        self.when::<E>(Handle::Ignore)
    }

    /// Leave events of type `E` queued until this state is left.
    pub fn defer<E: Event>(self) -> Self {
        self.when::<E>(Handle::Defer)
    }

    /// Handle any event type not otherwise declared in this state.
    pub fn when_any(mut self, handle: Handle) -> Self {
        self.wildcard = Some(handle);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    pub fn entry(&self) -> Option<ActionId> {
        self.entry
    }

    pub fn exit(&self) -> Option<ActionId> {
        self.exit
    }

    /// Whether this state declares an explicit `DefaultEvent` handler.
    /// Wildcards do not count; otherwise every machine with a wildcard
    /// would busy-spin on synthesized default events.
    pub fn has_default_handler(&self) -> bool {
        self.handlers.contains_key(&EventKey::of::<DefaultEvent>())
    }
}

/// How a dequeued event resolves against the current state stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The state whose declaration matched.
    pub state: &'static str,
    pub handle: Handle,
}

/// The complete state table of a machine or monitor.
#[derive(Debug, Clone)]
pub struct MachineTable {
    states: Vec<State>,
    by_name: HashMap<&'static str, usize>,
    start: usize,
}

/// Errors constructing a machine table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("machine declares no states")]
    NoStates,

    #[error("machine declares no start state")]
    NoStartState,

    #[error("machine declares more than one start state")]
    MultipleStartStates,

    #[error("machine declares state '{0}' twice")]
    DuplicateState(&'static str),
}

impl MachineTable {
    pub fn builder() -> MachineTableBuilder {
        MachineTableBuilder::default()
    }

    /// Single-state convenience used by uniform actors.
    pub fn single(state: State) -> Result<Self, TableError> {
        Self::builder().state(state.initial()).build()
    }

    pub fn start_state(&self) -> &'static str {
        self.states[self.start].name
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.by_name.get(name).map(|i| &self.states[*i])
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    /// Resolve an event against a state stack, walking top-down. Within a
    /// state an exact declaration wins over the wildcard.
    pub fn resolve(&self, stack: &[&'static str], key: EventKey) -> Option<Resolution> {
        for name in stack.iter().rev() {
            let state = self.state(name)?;
            if let Some(handle) = state.handlers.get(&key) {
                return Some(Resolution {
                    state: state.name,
                    handle: handle.clone(),
                });
            }
            if let Some(handle) = &state.wildcard {
                return Some(Resolution {
                    state: state.name,
                    handle: handle.clone(),
                });
            }
        }
        None
    }

    /// Whether any state in the stack declares an explicit default handler.
    pub fn has_default_handler(&self, stack: &[&'static str]) -> bool {
        stack
            .iter()
            .rev()
            .filter_map(|name| self.state(name))
            .any(State::has_default_handler)
    }
}

/// Fluent builder collecting state declarations.
#[derive(Debug, Default)]
pub struct MachineTableBuilder {
    states: Vec<State>,
}

impl MachineTableBuilder {
    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    pub fn build(self) -> Result<MachineTable, TableError> {
        if self.states.is_empty() {
            return Err(TableError::NoStates);
        }
        let mut by_name = HashMap::new();
        let mut start = None;
        for (index, state) in self.states.iter().enumerate() {
            if by_name.insert(state.name, index).is_some() {
                return Err(TableError::DuplicateState(state.name));
            }
            if state.initial {
                if start.is_some() {
                    return Err(TableError::MultipleStartStates);
                }
                start = Some(index);
            }
        }
        let start = start.ok_or(TableError::NoStartState)?;
        Ok(MachineTable {
            states: self.states,
            by_name,
            start,
        })
    }
}
