//! Basket Evaluator — recomputes the per-market top view and the
//! cross-market YES-basket condition on every event.
//!
//! Pure function of current book state and configuration: it reads
//! `BookTracker`, never mutates it.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::book::BookTracker;
use crate::model::{MarketDescriptor, MarketTop, Outcome};

/// Snapshot of the basket condition as of one evaluation.
#[derive(Debug, Clone)]
pub struct BasketView {
    /// `market_id -> {yes_bid, yes_ask, no_bid, no_ask}`, in configuration
    /// order via `MarketDescriptor::position`.
    pub per_market: BTreeMap<i64, MarketTop>,
    pub sum_yes_ask: Option<Decimal>,
    pub cond_ready: bool,
    pub cond_open: bool,
}

/// Recomputes the basket view for the configured, ordered market
/// descriptors against the current book tops.
pub fn evaluate(markets: &[MarketDescriptor], books: &BookTracker, threshold: Decimal) -> BasketView {
    let mut per_market = BTreeMap::new();
    let mut sum_yes_ask = Decimal::ZERO;
    let mut complete = true;

    for market in markets {
        let yes_top = books.top(market.asset_id(Outcome::Yes));
        let no_top = books.top(market.asset_id(Outcome::No));

        let yes_bid = yes_top.as_ref().and_then(|t| t.best_bid);
        let yes_ask = yes_top.as_ref().and_then(|t| t.best_ask);
        let no_bid = no_top.as_ref().and_then(|t| t.best_bid);
        let no_ask = no_top.as_ref().and_then(|t| t.best_ask);

        match yes_ask {
            Some(ask) => sum_yes_ask += ask,
            None => complete = false,
        }

        per_market.insert(
            market.market_id,
            MarketTop {
                yes_bid,
                yes_ask,
                no_bid,
                no_ask,
            },
        );
    }

    let sum_yes_ask = complete.then_some(sum_yes_ask);
    let cond_ready = sum_yes_ask.is_some();
    let cond_open = cond_ready && sum_yes_ask.is_some_and(|s| s < threshold);

    BasketView {
        per_market,
        sum_yes_ask,
        cond_ready,
        cond_open,
    }
}
