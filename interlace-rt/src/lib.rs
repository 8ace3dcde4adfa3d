//! # interlace-rt - Systematic Concurrency-Testing Runtime
//!
//! A controlled execution substrate for programs written as cooperating
//! asynchronous tasks and message-passing state machines. Under this
//! runtime the same program runs deterministically: every nondeterministic
//! choice — which operation to step, which event to dequeue, which branch
//! a random value takes, whether a timer fires now or later — is made by a
//! pluggable exploration strategy hunting for schedules that violate
//! user-declared safety and liveness properties.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use interlace_rt::prelude::*;
//!
//! #[derive(Debug)]
//! struct Ping { value: u64 }
//! impl Event for Ping {}
//!
//! struct Counter { seen: u64 }
//!
//! #[async_trait]
//! impl Actor for Counter {
//!     async fn handle_event(
//!         &mut self,
//!         event: &dyn Event,
//!         ctx: &mut ActorContext,
//!     ) -> HandlerResult {
//!         if let Some(ping) = event.downcast_ref::<Ping>() {
//!             self.seen += ping.value;
//!             ctx.assert(self.seen < 3, "saw too many pings").await;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), RuntimeError> {
//!     let config = Configuration::builder()
//!         .with_testing_iterations(100)
//!         .with_random_seed(7)
//!         .build()
//!         .map_err(RuntimeError::Configuration)?;
//!     let mut engine = TestingEngine::new(config)?;
//!     let report = engine.run(|rt| async move {
//!         let counter = rt.create_actor(Counter { seen: 0 }).await;
//!         for _ in 0..3 {
//!             rt.send_event(&counter, Ping { value: 1 }).await;
//!         }
//!     })?;
//!     assert!(report.found_bug());
//!     Ok(())
//! }
//! ```
//!
//! # Core Concepts
//!
//! - **Operation**: the scheduler's unit of interleaving — one per live
//!   actor and per live controlled task. Exactly one user operation runs
//!   at any time; user code observes linearizable memory without locks.
//! - **Scheduling point**: creation, send, dequeue, transitions, awaits,
//!   delays, joins, lock/semaphore waits, receives, random choices, and
//!   completion — the only places the scheduler may pick a different
//!   operation.
//! - **State machine**: an actor whose behavior is a declarative table of
//!   states (entry/exit actions, per-event handlers, ignore/defer masks)
//!   over a hierarchical state stack.
//! - **Monitor**: a specification automaton with hot/cold states, invoked
//!   synchronously; never scheduled, never addressed.
//! - **Schedule**: the recorded decision trace of one iteration,
//!   sufficient to replay it verbatim.
//!
//! # Module Organization
//!
//! ## Controlled Execution
//! - [`scheduler`] - Operation registry, suspension signals, selection
//! - [`strategy`] - Random, DFS, prioritization, probabilistic, fair, replay
//! - [`runtime`] - Runtime handle, configuration, errors, testing engine
//!
//! ## Programming Model
//! - [`actor`] - Actor/StateMachine traits, tables, inboxes, dispatch
//! - [`event`] - Typed events, dispatch keys, built-ins, envelopes
//! - [`task`] - Controlled tasks, joins, completion sources, locks
//! - [`group`] - Event groups and awaitable completions
//!
//! ## Checking
//! - [`monitor`] - Specification monitors and the liveness checker
//! - [`schedule`] - Trace recording, text format, replay input
//! - [`coverage`] - Visited states/events/transitions, graph, merging

pub mod actor;
pub mod coverage;
pub mod event;
pub mod group;
pub mod monitor;
pub mod runtime;
pub mod schedule;
pub mod scheduler;
pub mod strategy;
pub mod task;
pub mod util;

// Re-export commonly used types
pub use actor::{
    ActionId, Actor, ActorContext, ActorStatus, ExceptionOutcome, Handle, HandlerError,
    HandlerResult, MachineTable, State, StateMachine, TableError, Temperature,
};
pub use event::{DefaultEvent, Event, EventEnvelope, EventKey, HaltEvent, TimerElapsedEvent, UnitEvent};
pub use group::{AwaitableEventGroup, EventGroup, EventGroupCounter};
pub use monitor::{LivenessChecker, Monitor, MonitorContext};
pub use runtime::{
    BugReport, Configuration, CreateOptions, Runtime, RuntimeError, SendOptions, StrategyKind,
    TestReport, TestingEngine,
};
pub use schedule::{Decision, Schedule, ScheduleError};
pub use scheduler::{OperationKind, OperationStatus, StopReason, WaitReason};
pub use strategy::{
    DfsStrategy, FairStrategy, PctStrategy, ProbabilisticStrategy, RandomStrategy, ReplayStrategy,
    SchedulingStrategy,
};
pub use task::{
    when_all, when_any, CancellationToken, Lock, Semaphore, TaskCompletionSource, TaskError,
    TaskHandle,
};
pub use util::{ActorId, OperationId, TimerId};

/// Convenience imports for tests and harnesses.
pub mod prelude {
    pub use crate::actor::{
        Actor, ActorContext, Handle, HandlerError, HandlerResult, MachineTable, State,
        StateMachine, TableError,
    };
    pub use crate::event::{DefaultEvent, Event, HaltEvent, TimerElapsedEvent, UnitEvent};
    pub use crate::group::{AwaitableEventGroup, EventGroup, EventGroupCounter};
    pub use crate::monitor::{Monitor, MonitorContext};
    pub use crate::runtime::{
        Configuration, CreateOptions, Runtime, RuntimeError, SendOptions, StrategyKind,
        TestReport, TestingEngine,
    };
    pub use crate::task::{
        when_all, when_any, CancellationToken, Lock, Semaphore, TaskCompletionSource, TaskError,
        TaskHandle,
    };
    pub use crate::util::{ActorId, OperationId, TimerId};
    pub use async_trait::async_trait;
}
