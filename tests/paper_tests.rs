//! Paper Trader tests: the open/close/hold scenarios and fee rounding.

use chrono::Utc;
use gamma_basket_arb::basket::BasketView;
use gamma_basket_arb::model::{MarketDescriptor, MarketTop};
use gamma_basket_arb::paper::{FeeModel, PaperTrader};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn markets() -> Vec<MarketDescriptor> {
    ["A", "B", "C", "D"]
        .iter()
        .enumerate()
        .map(|(i, name)| MarketDescriptor {
            market_id: (i + 1) as i64,
            question: format!("market {name}"),
            yes_asset_id: format!("{name}-yes"),
            no_asset_id: format!("{name}-no"),
            position: i,
        })
        .collect()
}

fn view_from_yes_asks(markets: &[MarketDescriptor], yes_asks: &[Decimal], threshold: Decimal) -> BasketView {
    let mut per_market = BTreeMap::new();
    let mut sum = Decimal::ZERO;
    for (m, ask) in markets.iter().zip(yes_asks.iter()) {
        per_market.insert(
            m.market_id,
            MarketTop {
                yes_bid: None,
                yes_ask: Some(*ask),
                no_bid: None,
                no_ask: None,
            },
        );
        sum += *ask;
    }
    BasketView {
        per_market,
        sum_yes_ask: Some(sum),
        cond_ready: true,
        cond_open: sum < threshold,
    }
}

/// A view carrying both sides: yes_bid (for close evaluation) and
/// yes_ask (which also drives cond_ready/cond_open), as happens in the
/// real pipeline once both sides of the book have been observed.
fn view_from_bids_and_asks(
    markets: &[MarketDescriptor],
    yes_bids: &[Decimal],
    yes_asks: &[Decimal],
    threshold: Decimal,
) -> BasketView {
    let mut per_market = BTreeMap::new();
    let mut sum = Decimal::ZERO;
    for ((m, bid), ask) in markets.iter().zip(yes_bids.iter()).zip(yes_asks.iter()) {
        per_market.insert(
            m.market_id,
            MarketTop {
                yes_bid: Some(*bid),
                yes_ask: Some(*ask),
                no_bid: None,
                no_ask: None,
            },
        );
        sum += *ask;
    }
    BasketView {
        per_market,
        sum_yes_ask: Some(sum),
        cond_ready: true,
        cond_open: sum < threshold,
    }
}

#[test]
fn scenario_1_open_and_close_round_trip() {
    let markets = markets();
    let fees = FeeModel { rate: Decimal::ZERO, fixed_per_leg: Decimal::ZERO };
    let mut trader = PaperTrader::new(1, Decimal::ONE, Decimal::ONE, fees);

    let open_view = view_from_yes_asks(
        &markets,
        &[dec!(0.20), dec!(0.30), dec!(0.20), dec!(0.20)],
        Decimal::ONE,
    );
    let outcome = trader.step(&markets, &open_view, Utc::now());
    assert!(outcome.opened);
    let signal = outcome.signal.expect("signal recorded on open");
    assert_eq!(signal.edge, dec!(0.10), "edge = (1 - 0.90)/1 = 0.10");
    assert!(trader.is_open());

    // Bids rise to 0.25/0.35/0.25/0.25 while asks drift to a non-open sum
    // (0.30+0.40+0.30+0.30 = 1.30 >= threshold), so cond_ready is true and
    // cond_open is false: the close branch fires.
    let close_view = view_from_bids_and_asks(
        &markets,
        &[dec!(0.25), dec!(0.35), dec!(0.25), dec!(0.25)],
        &[dec!(0.30), dec!(0.40), dec!(0.30), dec!(0.30)],
        Decimal::ONE,
    );
    let outcome = trader.step(&markets, &close_view, Utc::now());
    assert!(outcome.closed);
    assert!(!trader.is_open());
    assert_eq!(trader.pnl().realized_pnl, dec!(0.20));
}

#[test]
fn scenario_2_no_open_at_exact_threshold() {
    let markets = markets();
    let fees = FeeModel { rate: Decimal::ZERO, fixed_per_leg: Decimal::ZERO };
    let mut trader = PaperTrader::new(1, Decimal::ONE, Decimal::ONE, fees);

    let view = view_from_yes_asks(&markets, &[dec!(0.25); 4], Decimal::ONE);
    let outcome = trader.step(&markets, &view, Utc::now());
    assert!(!outcome.opened);
    assert!(outcome.signal.is_none());
    assert!(!trader.is_open());
}

#[test]
fn scenario_3_fee_erodes_edge() {
    let markets = markets();
    let fees = FeeModel { rate: dec!(0.01), fixed_per_leg: Decimal::ZERO };
    let mut trader = PaperTrader::new(1, Decimal::ONE, Decimal::ONE, fees);

    let view = view_from_yes_asks(&markets, &[dec!(0.24); 4], Decimal::ONE);
    let outcome = trader.step(&markets, &view, Utc::now());
    assert!(outcome.opened);

    // Entry fees: 4 * round8(0.01 * 0.24) = 4 * 0.00240000 = 0.0096
    // We can't read entry_fees directly (private), but unrealized pnl at
    // the same prices must reflect them: mtm=0 (same price), fees =
    // entry (0.0096) + est-exit (0.0096) = 0.0192, so unrealized = -0.0192.
    // Asks are unchanged too, so the sum is still below threshold: the
    // basket stays open (still the richest action available) and holds.
    let same_price_view = view_from_bids_and_asks(&markets, &[dec!(0.24); 4], &[dec!(0.24); 4], Decimal::ONE);
    let outcome = trader.step(&markets, &same_price_view, Utc::now());
    assert!(!outcome.closed, "cond_open is still true at these prices, so it holds");
    let pnl = trader.pnl();
    assert_eq!(pnl.unrealized_pnl, Some(dec!(-0.0192)));
}

#[test]
fn scenario_4_stale_leg_blocks_open() {
    let markets = markets();
    let fees = FeeModel { rate: Decimal::ZERO, fixed_per_leg: Decimal::ZERO };
    let mut trader = PaperTrader::new(1, Decimal::ONE, Decimal::ONE, fees);

    let mut per_market = BTreeMap::new();
    for (m, ask) in markets.iter().take(3).zip([dec!(0.20), dec!(0.20), dec!(0.20)]) {
        per_market.insert(m.market_id, MarketTop { yes_bid: None, yes_ask: Some(ask), no_bid: None, no_ask: None });
    }
    // Fourth market's asset has never emitted: absent from per_market entirely.
    let view = BasketView {
        per_market,
        sum_yes_ask: None,
        cond_ready: false,
        cond_open: false,
    };

    let outcome = trader.step(&markets, &view, Utc::now());
    assert!(!outcome.opened);
    assert!(!trader.is_open());
}

#[test]
fn fee_rounding_is_half_to_even_at_8_digits() {
    let fees = FeeModel { rate: dec!(0.0123456785), fixed_per_leg: Decimal::ZERO };
    let fee = fees.fee(dec!(1), Decimal::ONE);
    let expected = dec!(0.0123456785).round_dp_with_strategy(8, rust_decimal::RoundingStrategy::MidpointNearestEven);
    assert_eq!(fee, expected);
    assert!((fee - dec!(0.01234568)).abs() < dec!(0.00000001));
}

#[test]
fn fixed_per_leg_fee_is_added_to_proportional_fee() {
    let fees = FeeModel { rate: dec!(0.01), fixed_per_leg: dec!(0.001) };
    let fee = fees.fee(dec!(0.50), Decimal::ONE);
    assert_eq!(fee, dec!(0.005) + dec!(0.001));
}

#[test]
fn unrealized_pnl_absent_not_zero_when_a_bid_is_missing() {
    let markets = markets();
    let fees = FeeModel { rate: Decimal::ZERO, fixed_per_leg: Decimal::ZERO };
    let mut trader = PaperTrader::new(1, Decimal::ONE, Decimal::ONE, fees);

    let open_view = view_from_yes_asks(&markets, &[dec!(0.20), dec!(0.20), dec!(0.20), dec!(0.20)], Decimal::ONE);
    trader.step(&markets, &open_view, Utc::now());
    assert!(trader.is_open());

    // Partial bids: one market has no yes_bid at all.
    let mut per_market = BTreeMap::new();
    for (i, m) in markets.iter().enumerate() {
        let bid = if i == 3 { None } else { Some(dec!(0.22)) };
        per_market.insert(m.market_id, MarketTop { yes_bid: bid, yes_ask: None, no_bid: None, no_ask: None });
    }
    let partial_view = BasketView { per_market, sum_yes_ask: None, cond_ready: false, cond_open: false };
    trader.step(&markets, &partial_view, Utc::now());

    assert_eq!(trader.pnl().unrealized_pnl, None, "unrealized must be absent, not zero, when a leg is unknown");
}

#[test]
fn close_conservation_law() {
    let markets = markets();
    let fees = FeeModel { rate: dec!(0.01), fixed_per_leg: Decimal::ZERO };
    let mut trader = PaperTrader::new(1, Decimal::ONE, Decimal::ONE, fees);

    let open_view = view_from_yes_asks(&markets, &[dec!(0.20), dec!(0.20), dec!(0.20), dec!(0.20)], Decimal::ONE);
    trader.step(&markets, &open_view, Utc::now());
    let realized_before = trader.pnl().realized_pnl;

    // Asks drift to sum 1.40 (>= threshold) so cond_ready is true and
    // cond_open is false: close fires.
    let close_view = view_from_bids_and_asks(
        &markets,
        &[dec!(0.25), dec!(0.25), dec!(0.25), dec!(0.25)],
        &[dec!(0.35), dec!(0.35), dec!(0.35), dec!(0.35)],
        Decimal::ONE,
    );
    let outcome = trader.step(&markets, &close_view, Utc::now());
    assert!(outcome.closed);

    let realized_after = trader.pnl().realized_pnl;
    let gross: Decimal = (dec!(0.25) - dec!(0.20)) * dec!(4);
    let entry_fees: Decimal = dec!(0.01) * dec!(0.20) * dec!(4);
    let exit_fees: Decimal = dec!(0.01) * dec!(0.25) * dec!(4);
    let expected_delta = gross - entry_fees - exit_fees;
    assert_eq!(realized_after - realized_before, expected_delta);
}
