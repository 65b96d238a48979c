//! Market order monitoring, one workflow per order-book kind

mod monitor;

use std::sync::Arc;

use eyre::Result;
use tracing::debug;

use crate::scheduler::{Engine, EngineConfig};
use crate::session::{OrderKind, Session};
use crate::workflow::PauseGate;

pub use monitor::{MarketMonitor, MonitorSettings, format_price};

/// Build an engine watching the given order books
pub fn market_engine(
    session: Arc<dyn Session>,
    kinds: &[OrderKind],
    settings: MonitorSettings,
    pause: PauseGate,
    config: EngineConfig,
) -> Result<Engine<OrderKind, MarketMonitor>> {
    debug!(?kinds, ?config, "market_engine: called");
    Engine::new(
        kinds.iter().copied(),
        |kind| MarketMonitor::new(session.clone(), *kind, settings.clone(), pause.clone()),
        config,
    )
}
