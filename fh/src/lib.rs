//! Farmhand - bounded-concurrency orchestration of background workflows
//!
//! One account, many entities (game badges, order books), one resumable
//! workflow per entity. The engine advances at most N workflows at a time and
//! forwards every snapshot they produce together with cross-unit counters.
//!
//! # Modules
//!
//! - [`progress`] - Snapshots and aggregate counters
//! - [`workflow`] - The `Workflow` trait and the pause gate
//! - [`scheduler`] - Concurrency gate, unit table and the engine loop
//! - [`session`] - Account session contract and the scripted session
//! - [`cards`] - Card farming workflow
//! - [`market`] - Order book monitoring workflow
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//! - [`output`] - Terminal rendering

pub mod cards;
pub mod cli;
pub mod config;
pub mod market;
pub mod output;
pub mod progress;
pub mod scheduler;
pub mod session;
pub mod workflow;

pub use progress::{Action, AggregateCounters, ProgressSnapshot, UnitProgress};
pub use scheduler::{Engine, EngineConfig, EngineStats};
pub use workflow::{PauseGate, Step, Workflow};
