//! Bounded-concurrency engine for per-entity workflows
//!
//! Keeps one workflow per entity, advances at most `max_concurrency` of them
//! at a time, and forwards every snapshot with aggregate counters.

mod config;
mod core;
mod gate;
mod table;

pub use config::EngineConfig;
pub use core::{Engine, EngineStats};
pub use gate::ConcurrencyGate;
pub use table::{UnitPhase, UnitTable};
