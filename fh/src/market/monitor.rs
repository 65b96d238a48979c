//! MarketMonitor - per order-book polling workflow

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use tracing::{debug, warn};

use crate::progress::{Action, Payload, ProgressSnapshot};
use crate::session::{OrderBook, OrderKind, Session, SessionError};
use crate::workflow::{PauseGate, Step, Workflow};

/// Timing of a market monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Wait between two polls
    pub poll_interval: Duration,
    /// Back-off after a transient session error
    pub retry_delay: Duration,
    /// Polls before the monitor stops; 0 keeps polling forever
    pub max_rounds: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            retry_delay: Duration::from_secs(30),
            max_rounds: 0,
        }
    }
}

/// Watches one order book and reports every change of its histogram
pub struct MarketMonitor {
    session: Arc<dyn Session>,
    kind: OrderKind,
    settings: MonitorSettings,
    pause: PauseGate,
    rounds: u32,
    backoff: Option<Duration>,
    last: Option<OrderBook>,
}

impl MarketMonitor {
    pub fn new(session: Arc<dyn Session>, kind: OrderKind, settings: MonitorSettings, pause: PauseGate) -> Self {
        debug!(%kind, ?settings, "MarketMonitor::new: called");
        Self {
            session,
            kind,
            settings,
            pause,
            rounds: 0,
            backoff: None,
            last: None,
        }
    }

    fn finished(&self) -> bool {
        self.settings.max_rounds > 0 && self.rounds >= self.settings.max_rounds
    }

    fn display(&self) -> String {
        match self.kind {
            OrderKind::Buy => "Buy orders".to_string(),
            OrderKind::Sell => "Sell orders".to_string(),
        }
    }

    fn on_book(&mut self, book: OrderBook) -> ProgressSnapshot {
        self.rounds += 1;
        let changed = self.last.as_ref() != Some(&book);
        let info = match book.best_price(self.kind) {
            Some(price) => format!("best price {}, volume {}", format_price(price), book.volume()),
            None => "no open orders".to_string(),
        };
        let mut snapshot = ProgressSnapshot::new(self.display())
            .with_status(format!("{} orders", book.len()))
            .with_info(info)
            .with_action(Action::Update)
            .with_payload(Payload::new(book.clone()));
        if self.settings.max_rounds > 0 {
            snapshot = snapshot.with_progress(self.rounds as u64, self.settings.max_rounds as u64);
        }
        if !changed {
            snapshot = snapshot.quiet();
        }
        self.last = Some(book);
        snapshot
    }

    fn on_session_error(&mut self, err: SessionError) -> Result<Step> {
        if !err.is_transient() {
            return Err(eyre::Report::new(err).wrap_err(format!("Failed to fetch {} orders", self.kind)));
        }
        let delay = err.retry_after().unwrap_or(self.settings.retry_delay);
        warn!(kind = %self.kind, error = %err, ?delay, "Transient session error, backing off");
        self.backoff = Some(delay);
        Ok(Step::Yield(
            ProgressSnapshot::new(self.display())
                .with_status(format!("Retrying in {}s", delay.as_secs()))
                .with_error(err.to_string()),
        ))
    }
}

#[async_trait]
impl Workflow for MarketMonitor {
    async fn advance(&mut self) -> Result<Step> {
        if self.finished() {
            return Ok(Step::Exhausted);
        }
        if let Some(delay) = self.backoff.take() {
            tokio::time::sleep(delay).await;
        } else if self.rounds > 0 {
            tokio::time::sleep(self.settings.poll_interval).await;
        }
        self.pause.wait_until_resumed().await;

        match self.session.order_book(self.kind).await {
            Ok(book) => Ok(Step::Yield(self.on_book(book))),
            Err(err) => self.on_session_error(err),
        }
    }

    fn remaining_work(&self) -> u64 {
        self.settings.max_rounds.saturating_sub(self.rounds) as u64
    }
}

/// Render a price in cents as `units.cents`
pub fn format_price(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
