//! Event model: typed payloads, dispatch keys, built-ins, and envelopes.

pub mod builtin;
pub mod envelope;
pub mod traits;

pub use builtin::{DefaultEvent, HaltEvent, TimerElapsedEvent, TimerInfo, UnitEvent};
pub use envelope::EventEnvelope;
pub use traits::{Event, EventKey};
