//! Shared data model for the basket-arbitrage pipeline.
//!
//! Asset identifiers, market descriptors, book levels, and the small
//! set of plain records that flow between components.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque printable string identifying one tradable side of one market.
pub type AssetId = String;

/// The two sides of a binary prediction market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Immutable market descriptor, supplied by the metadata collaborator at
/// startup and never mutated. `position` is the market's index within the
/// configured `market_ids` ordering (used to report baskets in
/// configuration order).
#[derive(Debug, Clone)]
pub struct MarketDescriptor {
    pub market_id: i64,
    pub question: String,
    pub yes_asset_id: AssetId,
    pub no_asset_id: AssetId,
    pub position: usize,
}

impl MarketDescriptor {
    pub fn asset_id(&self, outcome: Outcome) -> &AssetId {
        match outcome {
            Outcome::Yes => &self.yes_asset_id,
            Outcome::No => &self.no_asset_id,
        }
    }
}

/// Top-of-book view: best bid/ask as of a point in time, plus the raw
/// message that produced it (kept for persistence's `raw` column).
#[derive(Debug, Clone, Default)]
pub struct Top {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub as_of: Option<DateTime<Utc>>,
    pub raw: Option<Value>,
}

impl Top {
    pub fn mid(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }
}

/// Per-market view of the four prices the Basket Evaluator needs.
#[derive(Debug, Clone, Default)]
pub struct MarketTop {
    pub yes_bid: Option<Decimal>,
    pub yes_ask: Option<Decimal>,
    pub no_bid: Option<Decimal>,
    pub no_ask: Option<Decimal>,
}

/// A single change entry from a `changes` wire message.
#[derive(Debug, Clone)]
pub struct BookChange {
    pub side: BookSide,
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

/// An arbitrage signal record, persisted once per OPEN transition.
#[derive(Debug, Clone, Serialize)]
pub struct ArbSignal {
    pub event_id: i64,
    pub as_of: DateTime<Utc>,
    pub kind: String,
    pub edge: Decimal,
    pub detail: Value,
}

/// Running PnL for the configured event.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningPnl {
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Option<Decimal>,
}
