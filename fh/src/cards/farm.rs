//! CardFarm - per-badge card drop workflow

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::progress::{Action, Payload, ProgressSnapshot};
use crate::session::{Badge, GameHandle, Session, SessionError};
use crate::workflow::{PauseGate, Step, Workflow};

/// Timing of a card farm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmSettings {
    /// Time played between two drop checks
    pub wait_interval: Duration,
    /// Extra random wait added on top of `wait_interval`, up to this much
    pub wait_jitter: Duration,
    /// Granularity of the waiting progress bar
    pub tick: Duration,
    /// Back-off after a transient session error
    pub retry_delay: Duration,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            wait_interval: Duration::from_secs(15 * 60),
            wait_jitter: Duration::ZERO,
            tick: Duration::from_secs(1),
            retry_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Starting,
    Waiting { elapsed: Duration, target: Duration },
    Checking,
    Done,
}

/// Farms the card drops of one game
///
/// Starts the game, waits, checks how many cards are left, and repeats until
/// the badge has nothing left to drop. The game handle is handed to the
/// consumer in an [`Action::Check`] snapshot when the game starts.
pub struct CardFarm {
    session: Arc<dyn Session>,
    badge: Badge,
    settings: FarmSettings,
    pause: PauseGate,
    stage: Stage,
    handle: Option<GameHandle>,
    backoff: Option<Duration>,
}

impl CardFarm {
    pub fn new(session: Arc<dyn Session>, badge: Badge, settings: FarmSettings, pause: PauseGate) -> Self {
        debug!(game_id = badge.game_id, cards = badge.cards_remaining, "CardFarm::new: called");
        let stage = if badge.cards_remaining == 0 {
            Stage::Done
        } else {
            Stage::Starting
        };
        Self {
            session,
            badge,
            settings,
            pause,
            stage,
            handle: None,
            backoff: None,
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot::new(&self.badge.name)
    }

    fn next_wait(&self) -> Duration {
        self.settings.wait_interval + random_jitter(self.settings.wait_jitter)
    }

    /// Turn a session error into a retry snapshot, or stop the game and give up on fatal ones
    async fn on_session_error(&mut self, err: SessionError, doing: &str) -> Result<Step> {
        if !err.is_transient() {
            self.stop_game().await;
            self.stage = Stage::Done;
            return Err(eyre::Report::new(err).wrap_err(format!("Failed to {} for {}", doing, self.badge.name)));
        }
        let delay = err.retry_after().unwrap_or(self.settings.retry_delay);
        warn!(game_id = self.badge.game_id, error = %err, ?delay, "Transient session error, backing off");
        self.backoff = Some(delay);
        Ok(Step::Yield(
            self.snapshot()
                .with_status(format!("Retrying in {}s", delay.as_secs()))
                .with_error(err.to_string()),
        ))
    }

    async fn start(&mut self) -> Result<Step> {
        match self.session.start_game(self.badge.game_id).await {
            Ok(handle) => {
                info!(game_id = handle.game_id, "Game started");
                let target = self.next_wait();
                self.stage = Stage::Waiting {
                    elapsed: Duration::ZERO,
                    target,
                };
                self.handle = Some(handle.clone());
                Ok(Step::Yield(
                    self.snapshot()
                        .with_status("Running")
                        .with_info(format!("{} cards remaining", self.badge.cards_remaining))
                        .with_action(Action::Check)
                        .with_payload(Payload::new(handle)),
                ))
            }
            Err(err) => self.on_session_error(err, "start game").await,
        }
    }

    async fn stop_game(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(err) = self.session.stop_game(&handle).await
        {
            warn!(game_id = handle.game_id, error = %err, "Failed to stop game");
        }
    }

    async fn wait(&mut self, elapsed: Duration, target: Duration) -> Result<Step> {
        let tick = self.settings.tick.min(target - elapsed).max(Duration::from_millis(1));
        tokio::time::sleep(tick).await;
        let elapsed = (elapsed + tick).min(target);
        self.stage = if elapsed >= target {
            Stage::Checking
        } else {
            Stage::Waiting { elapsed, target }
        };
        Ok(Step::Yield(
            self.snapshot()
                .with_status("Waiting for drops")
                .with_progress(elapsed.as_millis() as u64, target.as_millis() as u64)
                .quiet(),
        ))
    }

    async fn check(&mut self) -> Result<Step> {
        let cards = match self.session.cards_remaining(self.badge.game_id).await {
            Ok(cards) => cards,
            Err(err) => return self.on_session_error(err, "check drops").await,
        };
        // Drops only ever go down; ignore a stale page showing more
        self.badge.cards_remaining = self.badge.cards_remaining.min(cards);

        if self.badge.cards_remaining > 0 {
            debug!(game_id = self.badge.game_id, cards, "CardFarm::check: cards left");
            let target = self.next_wait();
            self.stage = Stage::Waiting {
                elapsed: Duration::ZERO,
                target,
            };
            return Ok(Step::Yield(
                self.snapshot()
                    .with_status("Running")
                    .with_info(format!("{} cards remaining", self.badge.cards_remaining))
                    .with_action(Action::UpdateDrops),
            ));
        }

        self.stop_game().await;
        info!(game_id = self.badge.game_id, "All cards dropped");
        self.stage = Stage::Done;
        Ok(Step::Yield(
            self.snapshot()
                .with_status("Done")
                .with_info("No cards left")
                .with_action(Action::Clear),
        ))
    }
}

#[async_trait]
impl Workflow for CardFarm {
    async fn advance(&mut self) -> Result<Step> {
        if let Some(delay) = self.backoff.take() {
            debug!(?delay, "CardFarm::advance: backing off");
            tokio::time::sleep(delay).await;
        }
        self.pause.wait_until_resumed().await;

        match self.stage {
            Stage::Starting => self.start().await,
            Stage::Waiting { elapsed, target } => self.wait(elapsed, target).await,
            Stage::Checking => self.check().await,
            Stage::Done => Ok(Step::Exhausted),
        }
    }

    fn remaining_work(&self) -> u64 {
        self.badge.cards_remaining as u64
    }
}

fn random_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let millis = rand::rng().random_range(0..=max.as_millis() as u64);
    Duration::from_millis(millis)
}
