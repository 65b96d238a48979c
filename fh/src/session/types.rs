//! Session value types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Game badge with cards left to drop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub game_id: u32,
    pub name: String,
    pub cards_remaining: u32,
}

/// A game the session is currently playing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameHandle {
    pub game_id: u32,
    pub name: String,
}

/// Side of the market an order book belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderKind {
    Buy,
    Sell,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Buy => write!(f, "buy"),
            OrderKind::Sell => write!(f, "sell"),
        }
    }
}

/// A single market order, price in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub price: u64,
    pub quantity: u32,
}

/// Open orders of one kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub orders: Vec<Order>,
}

impl OrderBook {
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Highest price for buy orders, lowest for sell orders
    pub fn best_price(&self, kind: OrderKind) -> Option<u64> {
        let prices = self.orders.iter().map(|order| order.price);
        match kind {
            OrderKind::Buy => prices.max(),
            OrderKind::Sell => prices.min(),
        }
    }

    /// Total quantity over all orders
    pub fn volume(&self) -> u64 {
        self.orders.iter().map(|order| order.quantity as u64).sum()
    }
}
