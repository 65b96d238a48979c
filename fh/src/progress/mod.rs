//! Progress values emitted by workflows and forwarded by the engine
//!
//! A workflow produces one [`ProgressSnapshot`] per advance. The engine wraps it
//! in a [`UnitProgress`] together with the [`AggregateCounters`] computed at the
//! moment of forwarding.

mod snapshot;

pub use snapshot::{Action, AggregateCounters, Payload, Progress, ProgressSnapshot, UnitProgress};
