//! Paper Trader — FLAT/OPEN state machine driven by the basket
//! condition, with deterministic fill accounting.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;

use crate::basket::BasketView;
use crate::model::{ArbSignal, MarketDescriptor, RunningPnl};

/// Proportional rate plus an optional fixed per-leg add-on, applied
/// identically at entry and exit legs when the fixed component is
/// nonzero.
#[derive(Debug, Clone, Copy)]
pub struct FeeModel {
    pub rate: Decimal,
    pub fixed_per_leg: Decimal,
}

impl FeeModel {
    /// `fee = rate * notional`, rounded to 8 fractional digits
    /// half-to-even, plus the fixed per-leg charge.
    pub fn fee(&self, price: Decimal, qty: Decimal) -> Decimal {
        let proportional = if self.rate > Decimal::ZERO {
            (self.rate * price * qty)
                .round_dp_with_strategy(8, RoundingStrategy::MidpointNearestEven)
        } else {
            Decimal::ZERO
        };
        proportional + self.fixed_per_leg
    }
}

/// An open basket position: one YES leg per configured market.
#[derive(Debug, Clone)]
pub struct BasketPosition {
    pub qty_per_leg: Decimal,
    pub entry_yes_prices: BTreeMap<i64, Decimal>,
    pub entry_fees: BTreeMap<i64, Decimal>,
    pub opened_at: DateTime<Utc>,
}

/// Outcome of stepping the trader on one event: the position transition
/// (if any) to persist/print.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub opened: bool,
    pub closed: bool,
    pub signal: Option<ArbSignal>,
}

pub struct PaperTrader {
    event_id: i64,
    qty: Decimal,
    threshold: Decimal,
    fees: FeeModel,
    position: Option<BasketPosition>,
    pnl: RunningPnl,
}

impl PaperTrader {
    pub fn new(event_id: i64, qty: Decimal, threshold: Decimal, fees: FeeModel) -> Self {
        Self {
            event_id,
            qty,
            threshold,
            fees,
            position: None,
            pnl: RunningPnl::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    pub fn pnl(&self) -> RunningPnl {
        self.pnl
    }

    /// Steps the FLAT/OPEN machine against the current basket view, per
    /// this transition table:
    ///
    /// | state | ready | open | action           |
    /// |-------|-------|------|------------------|
    /// | FLAT  | —     | false| none             |
    /// | FLAT  | —     | true | OPEN (if legs ok)|
    /// | OPEN  | false | —    | hold             |
    /// | OPEN  | true  | true | hold             |
    /// | OPEN  | true  | false| CLOSE (if legs ok)|
    pub fn step(&mut self, markets: &[MarketDescriptor], view: &BasketView, as_of: DateTime<Utc>) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        if self.position.is_none() {
            if view.cond_open {
                if let Some(signal) = self.try_open(markets, view, as_of) {
                    outcome.opened = true;
                    outcome.signal = Some(signal);
                }
            }
        } else if view.cond_ready && !view.cond_open {
            if self.try_close(markets, view) {
                outcome.closed = true;
            }
        }

        self.recompute_unrealized(markets, view);
        outcome
    }

    fn try_open(
        &mut self,
        markets: &[MarketDescriptor],
        view: &BasketView,
        as_of: DateTime<Utc>,
    ) -> Option<ArbSignal> {
        let sum_yes_ask = view.sum_yes_ask?;

        let mut entry_yes_prices = BTreeMap::new();
        let mut entry_fees = BTreeMap::new();
        for market in markets {
            let yes_ask = view.per_market.get(&market.market_id)?.yes_ask?;
            entry_yes_prices.insert(market.market_id, yes_ask);
            entry_fees.insert(market.market_id, self.fees.fee(yes_ask, self.qty));
        }

        self.position = Some(BasketPosition {
            qty_per_leg: self.qty,
            entry_yes_prices,
            entry_fees,
            opened_at: as_of,
        });

        let edge = (self.threshold - sum_yes_ask) / self.threshold;
        Some(ArbSignal {
            event_id: self.event_id,
            as_of,
            kind: "BUY_YES_ALL".to_string(),
            edge,
            detail: json!({
                "threshold": self.threshold.to_string(),
                "sum_yes_ask": sum_yes_ask.to_string(),
                "markets": markets.iter().map(|m| m.market_id).collect::<Vec<_>>(),
            }),
        })
    }

    fn try_close(&mut self, markets: &[MarketDescriptor], view: &BasketView) -> bool {
        let Some(position) = &self.position else {
            return false;
        };

        let mut exit_pnl = Decimal::ZERO;
        let mut exit_fee = Decimal::ZERO;
        for market in markets {
            let Some(yes_bid) = view.per_market.get(&market.market_id).and_then(|m| m.yes_bid) else {
                return false;
            };
            let entry = position.entry_yes_prices[&market.market_id];
            exit_pnl += (yes_bid - entry) * position.qty_per_leg;
            exit_fee += self.fees.fee(yes_bid, position.qty_per_leg);
        }

        let entry_fee_sum: Decimal = position.entry_fees.values().copied().sum();
        self.pnl.realized_pnl += exit_pnl - entry_fee_sum - exit_fee;
        self.position = None;
        true
    }

    fn recompute_unrealized(&mut self, markets: &[MarketDescriptor], view: &BasketView) {
        let Some(position) = &self.position else {
            self.pnl.unrealized_pnl = None;
            return;
        };

        let mut mtm = Decimal::ZERO;
        let mut est_exit_fee = Decimal::ZERO;
        for market in markets {
            let Some(yes_bid) = view.per_market.get(&market.market_id).and_then(|m| m.yes_bid) else {
                self.pnl.unrealized_pnl = None;
                return;
            };
            let entry = position.entry_yes_prices[&market.market_id];
            mtm += (yes_bid - entry) * position.qty_per_leg;
            est_exit_fee += self.fees.fee(yes_bid, position.qty_per_leg);
        }

        let entry_fee_sum: Decimal = position.entry_fees.values().copied().sum();
        self.pnl.unrealized_pnl = Some(mtm - entry_fee_sum - est_exit_fee);
    }
}
