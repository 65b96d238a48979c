//! Account session contract used by the built-in workflows
//!
//! The network protocol lives outside this crate. Workflows only see the
//! [`Session`] trait, injected by the caller when the workflow is built.

mod client;
mod error;
mod scripted;
mod types;

pub use client::Session;
pub use error::SessionError;
pub use scripted::{BadgeFixture, Failure, FailureKind, Fixture, MarketFixture, ScriptedSession};
pub use types::{Badge, GameHandle, Order, OrderBook, OrderKind};
