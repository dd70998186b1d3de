//! Book State — per-asset limit order book with snapshot/delta/top-of-book
//! application.
//!
//! Keyed maps (price → size) rather than sorted vecs: duplicate prices
//! within a snapshot must resolve last-wins, and a zero-size delta must
//! remove a level in O(1), which a `HashMap` gives for free.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::model::{AssetId, BookChange, BookSide, Top};

/// One asset's order book: depth maps plus the derived top.
#[derive(Debug, Clone, Default)]
pub struct BookState {
    bids: HashMap<Decimal, Decimal>,
    asks: HashMap<Decimal, Decimal>,
    top: Top,
}

impl BookState {
    /// Clears both sides and loads the provided levels. Entries whose price
    /// or size fails to parse are the caller's concern — this function
    /// takes already-parsed `Decimal` pairs; duplicate prices within the
    /// same snapshot: last wins (`HashMap::insert` semantics).
    pub fn apply_snapshot(
        &mut self,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
        as_of: DateTime<Utc>,
        raw: Option<Value>,
    ) {
        self.bids.clear();
        self.asks.clear();
        for &(price, size) in bids {
            insert_level(&mut self.bids, price, size);
        }
        for &(price, size) in asks {
            insert_level(&mut self.asks, price, size);
        }
        self.recompute_top(as_of, raw);
    }

    /// Applies a batch of deltas. A change with size ≤ 0 removes the level
    /// (a no-op if it was already absent); otherwise the level is set.
    pub fn apply_changes(
        &mut self,
        changes: &[BookChange],
        as_of: DateTime<Utc>,
        raw: Option<Value>,
    ) {
        for change in changes {
            let side = match change.side {
                BookSide::Bid => &mut self.bids,
                BookSide::Ask => &mut self.asks,
            };
            insert_level(side, change.price, change.size);
        }
        self.recompute_top(as_of, raw);
    }

    /// Directly overwrites the top. Depth maps are NOT cleared — they may
    /// be stale, but a top-only update is authoritative for the top view
    /// (Open Question #2: resolved in favor of retaining depth).
    pub fn apply_top(
        &mut self,
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
        as_of: DateTime<Utc>,
        raw: Option<Value>,
    ) {
        self.top = Top {
            best_bid,
            best_ask,
            as_of: Some(as_of),
            raw,
        };
    }

    pub fn top(&self) -> Top {
        self.top.clone()
    }

    fn recompute_top(&mut self, as_of: DateTime<Utc>, raw: Option<Value>) {
        let best_bid = self.bids.keys().copied().max();
        let best_ask = self.asks.keys().copied().min();
        self.top = Top {
            best_bid,
            best_ask,
            as_of: Some(as_of),
            raw,
        };
    }
}

/// Negative or zero sizes remove the level; a zero-size removal of an
/// absent level is a no-op, not an error.
fn insert_level(side: &mut HashMap<Decimal, Decimal>, price: Decimal, size: Decimal) {
    if size <= Decimal::ZERO {
        side.remove(&price);
    } else {
        side.insert(price, size);
    }
}

/// Thread-safe map of `BookState` keyed by asset identifier, created
/// lazily on first event, never destroyed, shared between the receive
/// loop and the evaluator/projector reads.
#[derive(Debug, Clone, Default)]
pub struct BookTracker {
    inner: Arc<RwLock<HashMap<AssetId, BookState>>>,
}

impl BookTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_book<R>(&self, asset_id: &AssetId, f: impl FnOnce(&mut BookState) -> R) -> R {
        let mut guard = self.inner.write().unwrap();
        let book = guard.entry(asset_id.clone()).or_insert_with(|| {
            debug!(asset_id = %asset_id, "creating book state for new asset");
            BookState::default()
        });
        f(book)
    }

    pub fn top(&self, asset_id: &AssetId) -> Option<Top> {
        self.inner.read().unwrap().get(asset_id).map(|b| b.top())
    }
}
