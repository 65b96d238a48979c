//! Offline session driven by a YAML fixture
//!
//! Used by the `fh` binary for dry runs and by tests. Card drops and failures
//! follow the script exactly, so runs are reproducible.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Badge, GameHandle, Order, OrderBook, OrderKind, Session, SessionError};

/// Kind of failure a fixture can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Network,
    RateLimited,
    Unauthorized,
}

impl FailureKind {
    fn to_error(self) -> SessionError {
        match self {
            FailureKind::Network => SessionError::Network("scripted connection reset".to_string()),
            FailureKind::RateLimited => SessionError::RateLimited {
                retry_after: Duration::from_secs(1),
            },
            FailureKind::Unauthorized => SessionError::Unauthorized,
        }
    }
}

/// Fail the `on`-th call (1-based) with `kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub on: u32,
    pub kind: FailureKind,
}

/// Scripted badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeFixture {
    #[serde(rename = "game-id")]
    pub game_id: u32,
    pub name: String,
    /// Cards left at the start of the run
    pub cards: u32,
    /// One card drops every this many checks
    #[serde(default = "default_drop_every", rename = "drop-every")]
    pub drop_every: u32,
    #[serde(default)]
    pub fail: Option<Failure>,
}

fn default_drop_every() -> u32 {
    1
}

/// Scripted order books
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketFixture {
    pub buy: Vec<Order>,
    pub sell: Vec<Order>,
    pub fail: Option<Failure>,
}

/// Whole fixture file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub badges: Vec<BadgeFixture>,
    pub market: MarketFixture,
}

impl Fixture {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read fixture {}", path.display()))?;
        serde_yaml::from_str(&content).context(format!("Failed to parse fixture {}", path.display()))
    }
}

#[derive(Debug)]
struct GameState {
    name: String,
    cards: u32,
    drop_every: u32,
    fail: Option<Failure>,
    checks: u32,
}

#[derive(Debug, Default)]
struct ScriptState {
    order: Vec<u32>,
    games: HashMap<u32, GameState>,
    playing: HashSet<u32>,
    market: MarketFixture,
    polls: u32,
}

/// [`Session`] implementation replaying a [`Fixture`]
#[derive(Debug)]
pub struct ScriptedSession {
    state: Mutex<ScriptState>,
}

impl ScriptedSession {
    pub fn new(fixture: Fixture) -> Self {
        debug!(badges = fixture.badges.len(), "ScriptedSession::new: called");
        let mut state = ScriptState {
            market: fixture.market,
            ..Default::default()
        };
        for badge in fixture.badges {
            state.order.push(badge.game_id);
            state.games.insert(
                badge.game_id,
                GameState {
                    name: badge.name,
                    cards: badge.cards,
                    drop_every: badge.drop_every.max(1),
                    fail: badge.fail,
                    checks: 0,
                },
            );
        }
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Fixture::load(path)?))
    }

    /// Games currently marked as played
    pub fn playing(&self) -> Vec<u32> {
        let mut playing: Vec<u32> = self.lock().playing.iter().copied().collect();
        playing.sort_unstable();
        playing
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn badges(&self) -> Result<Vec<Badge>, SessionError> {
        let state = self.lock();
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.games.get(id).map(|game| (id, game)))
            .map(|(id, game)| Badge {
                game_id: *id,
                name: game.name.clone(),
                cards_remaining: game.cards,
            })
            .collect())
    }

    async fn cards_remaining(&self, game_id: u32) -> Result<u32, SessionError> {
        let mut state = self.lock();
        let game = state
            .games
            .get_mut(&game_id)
            .ok_or_else(|| SessionError::NotFound(format!("game {}", game_id)))?;

        game.checks += 1;
        if let Some(fail) = game.fail
            && fail.on == game.checks
        {
            debug!(game_id, checks = game.checks, "ScriptedSession::cards_remaining: scripted failure");
            return Err(fail.kind.to_error());
        }
        if game.cards > 0 && game.checks % game.drop_every == 0 {
            game.cards -= 1;
        }
        debug!(game_id, cards = game.cards, "ScriptedSession::cards_remaining: checked");
        Ok(game.cards)
    }

    async fn start_game(&self, game_id: u32) -> Result<GameHandle, SessionError> {
        let mut state = self.lock();
        let name = state
            .games
            .get(&game_id)
            .map(|game| game.name.clone())
            .ok_or_else(|| SessionError::NotFound(format!("game {}", game_id)))?;
        state.playing.insert(game_id);
        Ok(GameHandle { game_id, name })
    }

    async fn stop_game(&self, handle: &GameHandle) -> Result<(), SessionError> {
        self.lock().playing.remove(&handle.game_id);
        Ok(())
    }

    async fn order_book(&self, kind: OrderKind) -> Result<OrderBook, SessionError> {
        let mut state = self.lock();
        state.polls += 1;
        if let Some(fail) = state.market.fail
            && fail.on == state.polls
        {
            debug!(%kind, polls = state.polls, "ScriptedSession::order_book: scripted failure");
            return Err(fail.kind.to_error());
        }
        let orders = match kind {
            OrderKind::Buy => state.market.buy.clone(),
            OrderKind::Sell => state.market.sell.clone(),
        };
        Ok(OrderBook { orders })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
badges:
  - game-id: 440
    name: Team Fortress 2
    cards: 2
  - game-id: 570
    name: Dota 2
    cards: 3
    drop-every: 2
    fail: { on: 1, kind: network }
market:
  buy:
    - { price: 12, quantity: 3 }
  sell:
    - { price: 20, quantity: 1 }
    - { price: 18, quantity: 4 }
"#;

    fn session() -> ScriptedSession {
        ScriptedSession::new(serde_yaml::from_str(FIXTURE).unwrap())
    }

    #[tokio::test]
    async fn test_badges_keep_fixture_order() {
        let badges = session().badges().await.unwrap();
        let ids: Vec<u32> = badges.iter().map(|b| b.game_id).collect();
        assert_eq!(ids, vec![440, 570]);
        assert_eq!(badges[1].cards_remaining, 3);
    }

    #[tokio::test]
    async fn test_cards_drop_per_check() {
        let session = session();
        assert_eq!(session.cards_remaining(440).await.unwrap(), 1);
        assert_eq!(session.cards_remaining(440).await.unwrap(), 0);
        assert_eq!(session.cards_remaining(440).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scripted_failure_and_drop_rate() {
        let session = session();
        assert_eq!(
            session.cards_remaining(570).await,
            Err(SessionError::Network("scripted connection reset".to_string()))
        );
        assert_eq!(session.cards_remaining(570).await.unwrap(), 2);
        assert_eq!(session.cards_remaining(570).await.unwrap(), 2);
        assert_eq!(session.cards_remaining(570).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_game() {
        assert!(matches!(
            session().cards_remaining(1).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_start_and_stop_game() {
        let session = session();
        let handle = session.start_game(440).await.unwrap();
        assert_eq!(handle.name, "Team Fortress 2");
        assert_eq!(session.playing(), vec![440]);

        session.stop_game(&handle).await.unwrap();
        assert!(session.playing().is_empty());
    }

    #[tokio::test]
    async fn test_order_books() {
        let session = session();
        let sell = session.order_book(OrderKind::Sell).await.unwrap();
        assert_eq!(sell.len(), 2);
        assert_eq!(sell.best_price(OrderKind::Sell), Some(18));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("fixture.yml");
        std::fs::write(&path, FIXTURE).unwrap();

        let fixture = Fixture::load(&path).unwrap();
        assert_eq!(fixture.badges.len(), 2);
        assert_eq!(fixture.badges[1].drop_every, 2);
        assert_eq!(fixture.market.buy.len(), 1);
    }
}
