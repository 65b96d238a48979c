//! Session trait definition

use async_trait::async_trait;

use super::{Badge, GameHandle, OrderBook, OrderKind, SessionError};

/// Logged-in account session
///
/// Shared between workflows as `Arc<dyn Session>`; implementations must allow
/// concurrent calls.
#[async_trait]
pub trait Session: Send + Sync {
    /// Badges of the account that may still drop cards
    async fn badges(&self) -> Result<Vec<Badge>, SessionError>;

    /// Cards the game can still drop
    async fn cards_remaining(&self, game_id: u32) -> Result<u32, SessionError>;

    /// Mark the game as being played
    async fn start_game(&self, game_id: u32) -> Result<GameHandle, SessionError>;

    /// Stop playing a game started with [`start_game`](Session::start_game)
    async fn stop_game(&self, handle: &GameHandle) -> Result<(), SessionError>;

    /// Current open orders of one kind
    async fn order_book(&self, kind: OrderKind) -> Result<OrderBook, SessionError>;
}
