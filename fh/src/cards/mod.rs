//! Card farming across all badges of an account
//!
//! One [`CardFarm`] per badge, driven by the engine. Badge order only decides
//! the order units are seeded in.

mod farm;

use std::collections::HashMap;
use std::sync::Arc;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::progress::{Action, UnitProgress};
use crate::scheduler::{Engine, EngineConfig};
use crate::session::{Badge, GameHandle, Session};
use crate::workflow::PauseGate;

pub use farm::{CardFarm, FarmSettings};

/// Initial ordering of badges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadgeSort {
    /// Keep the order the session reports
    #[default]
    None,
    /// Most cards remaining first
    CardsRemaining,
    /// Alphabetical by game name
    Name,
}

/// Drop badges with nothing to farm and apply the sort policy
pub fn order_badges(badges: Vec<Badge>, sort: BadgeSort) -> Vec<Badge> {
    let mut badges: Vec<Badge> = badges.into_iter().filter(|b| b.cards_remaining > 0).collect();
    match sort {
        BadgeSort::None => {}
        BadgeSort::CardsRemaining => badges.sort_by(|a, b| b.cards_remaining.cmp(&a.cards_remaining)),
        BadgeSort::Name => badges.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    badges
}

/// Build an engine farming every badge of the session that still has cards
pub async fn card_engine(
    session: Arc<dyn Session>,
    settings: FarmSettings,
    sort: BadgeSort,
    pause: PauseGate,
    config: EngineConfig,
) -> Result<Engine<u32, CardFarm>> {
    debug!(?sort, ?config, "card_engine: called");
    let badges = session.badges().await.context("Failed to list badges")?;
    let badges = order_badges(badges, sort);
    info!(badges = badges.len(), "Farming badges");

    let ids: Vec<u32> = badges.iter().map(|b| b.game_id).collect();
    let mut by_id: HashMap<u32, Badge> = badges.into_iter().map(|b| (b.game_id, b)).collect();

    Engine::try_new(
        ids,
        |game_id| {
            let badge = by_id
                .remove(game_id)
                .ok_or_else(|| eyre::eyre!("Badge {} listed twice", game_id))?;
            Ok(CardFarm::new(session.clone(), badge, settings.clone(), pause.clone()))
        },
        config,
    )
}

/// Games started by card farms and not yet cleared, as seen by the consumer
///
/// Farms whose advance was aborted cannot stop their own game, so the
/// consumer stops whatever is still listed here once the engine is done.
#[derive(Debug, Default)]
pub struct RunningGames {
    games: HashMap<u32, GameHandle>,
}

impl RunningGames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `check` handles and forget units that were cleared
    pub fn observe(&mut self, progress: &UnitProgress<u32>) {
        match progress.snapshot.action {
            Action::Check => {
                if let Some(handle) = progress
                    .snapshot
                    .payload
                    .as_ref()
                    .and_then(|payload| payload.downcast_ref::<GameHandle>())
                {
                    debug!(game_id = handle.game_id, "RunningGames::observe: game started");
                    self.games.insert(progress.unit, handle.clone());
                }
            }
            Action::Clear => {
                self.games.remove(&progress.unit);
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Stop every tracked game; failures are logged and skipped
    pub async fn stop_all(&mut self, session: &dyn Session) {
        for (game_id, handle) in self.games.drain() {
            match session.stop_game(&handle).await {
                Ok(()) => info!(game_id, "Stopped game left running"),
                Err(err) => warn!(game_id, error = %err, "Failed to stop game"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{BadgeFixture, Failure, FailureKind, Fixture, ScriptedSession};
    use std::time::Duration;

    fn badge(id: u32, name: &str, cards: u32) -> Badge {
        Badge {
            game_id: id,
            name: name.to_string(),
            cards_remaining: cards,
        }
    }

    #[test]
    fn test_order_badges_filters_and_sorts() {
        let badges = vec![badge(1, "Beta", 2), badge(2, "Alpha", 0), badge(3, "Gamma", 5)];

        let ids = |v: Vec<Badge>| v.iter().map(|b| b.game_id).collect::<Vec<_>>();
        assert_eq!(ids(order_badges(badges.clone(), BadgeSort::None)), vec![1, 3]);
        assert_eq!(ids(order_badges(badges.clone(), BadgeSort::CardsRemaining)), vec![3, 1]);
        assert_eq!(ids(order_badges(badges, BadgeSort::Name)), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_card_engine_farms_all_badges() {
        let fixture = Fixture {
            badges: vec![
                BadgeFixture {
                    game_id: 1,
                    name: "One".to_string(),
                    cards: 2,
                    drop_every: 1,
                    fail: None,
                },
                BadgeFixture {
                    game_id: 2,
                    name: "Two".to_string(),
                    cards: 1,
                    drop_every: 1,
                    fail: None,
                },
                BadgeFixture {
                    game_id: 3,
                    name: "Three".to_string(),
                    cards: 0,
                    drop_every: 1,
                    fail: None,
                },
            ],
            ..Default::default()
        };
        let session = Arc::new(ScriptedSession::new(fixture));
        let settings = FarmSettings {
            wait_interval: Duration::from_secs(2),
            tick: Duration::from_secs(1),
            ..Default::default()
        };

        let mut engine = card_engine(
            session.clone(),
            settings,
            BadgeSort::CardsRemaining,
            PauseGate::new(),
            EngineConfig::new(2),
        )
        .await
        .unwrap();

        let mut outstanding = Vec::new();
        while let Some(item) = engine.next().await {
            let progress = item.unwrap();
            assert!(progress.counters.running_count <= 2);
            outstanding.push(progress.counters.total_outstanding_work);
        }

        assert_eq!(outstanding.first(), Some(&3));
        assert_eq!(outstanding.last(), Some(&0));
        assert!(outstanding.windows(2).all(|w| w[1] <= w[0]));
        assert!(engine.unit_phase(&3).is_none(), "badge without cards is not seeded");
        assert!(session.playing().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_games_stopped_after_fatal_error() {
        let fixture = Fixture {
            badges: vec![
                BadgeFixture {
                    game_id: 1,
                    name: "Slow".to_string(),
                    cards: 5,
                    drop_every: 1,
                    fail: None,
                },
                BadgeFixture {
                    game_id: 2,
                    name: "Broken".to_string(),
                    cards: 1,
                    drop_every: 1,
                    fail: Some(Failure {
                        on: 1,
                        kind: FailureKind::Unauthorized,
                    }),
                },
            ],
            ..Default::default()
        };
        let session = Arc::new(ScriptedSession::new(fixture));
        let settings = FarmSettings {
            wait_interval: Duration::from_secs(2),
            tick: Duration::from_secs(1),
            ..Default::default()
        };

        let mut engine = card_engine(
            session.clone(),
            settings,
            BadgeSort::None,
            PauseGate::new(),
            EngineConfig::new(2),
        )
        .await
        .unwrap();

        let mut running = RunningGames::new();
        let mut failed = false;
        while let Some(item) = engine.next().await {
            match item {
                Ok(progress) => running.observe(&progress),
                Err(_) => failed = true,
            }
        }
        assert!(failed);
        assert_eq!(session.playing(), vec![1], "aborted farm leaves its game running");
        // The failing farm stopped its own game but never reported a clear
        assert_eq!(running.len(), 2);

        running.stop_all(session.as_ref()).await;
        assert!(running.is_empty());
        assert!(session.playing().is_empty());
    }
}
