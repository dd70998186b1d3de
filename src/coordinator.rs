//! Coordinator — owns configuration, the book-state map, the paper
//! trader, the print/DB throttles, and the reconnect loop.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::basket::{self, BasketView};
use crate::book::BookTracker;
use crate::config::Settings;
use crate::feed::FeedEvent;
use crate::model::{AssetId, MarketDescriptor, Top};
use crate::paper::{FeeModel, PaperTrader};
use crate::persistence::PersistenceProjector;
use crate::stream::StreamClient;

/// Drives the full pipeline for one configured event: stream client ->
/// feed parser (already applied by the stream client) -> book state ->
/// basket evaluator -> (paper trader, persistence projector, console).
pub struct Coordinator {
    settings: Settings,
    markets: Vec<MarketDescriptor>,
    asset_ids: Vec<AssetId>,
    books: BookTracker,
    trader: PaperTrader,
    projector: Option<PersistenceProjector>,
    last_print: Option<Instant>,
}

impl Coordinator {
    /// Fails when `write_db` is set and the initial connection to the
    /// database cannot be established — unreachable persistence at
    /// startup is a fatal error, not a degrade-and-continue condition.
    pub async fn new(settings: Settings, markets: Vec<MarketDescriptor>) -> anyhow::Result<Self> {
        let mut asset_ids = Vec::with_capacity(markets.len() * 2);
        for m in &markets {
            asset_ids.push(m.yes_asset_id.clone());
            asset_ids.push(m.no_asset_id.clone());
        }

        let fees = FeeModel {
            rate: settings.fee_rate,
            fixed_per_leg: settings.fixed_fee_per_leg,
        };
        let trader = PaperTrader::new(settings.event_id, settings.qty, settings.threshold, fees);

        let projector = if settings.write_db {
            let projector = PersistenceProjector::connect(
                &settings.database_url,
                settings.db_interval_s,
                settings.write_ticks,
            )
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "cannot reach the database at startup (WRITE_DB is enabled): {e}"
                )
            })?;
            Some(projector)
        } else {
            None
        };

        Ok(Self {
            settings,
            markets,
            asset_ids,
            books: BookTracker::new(),
            trader,
            projector,
            last_print: None,
        })
    }

    /// Runs forever: connects, streams events, reconnects with a delay
    /// on any transport fault.
    pub async fn run(&mut self) {
        loop {
            let (tx, mut rx) = mpsc::channel(256);
            let asset_ids = self.asset_ids.clone();
            let auth = self.settings.clob_auth();
            let client = StreamClient::new(
                self.settings.ws_url.clone(),
                self.settings.ping_interval_s,
                self.settings.recv_timeout_s,
            );

            let recv_task = tokio::spawn(async move { client.run(&asset_ids, auth, tx).await });

            while let Some((as_of, asset_id, event)) = rx.recv().await {
                self.handle_event(asset_id, event, as_of).await;
            }

            match recv_task.await {
                Ok(Ok(())) => info!("stream closed gracefully"),
                Ok(Err(e)) => crate::stream::log_disconnect(&e, self.settings.reconnect_delay_s),
                Err(e) => warn!(error = %e, "stream task panicked"),
            }

            tokio::time::sleep(Duration::from_secs(self.settings.reconnect_delay_s)).await;
        }
    }

    async fn handle_event(
        &mut self,
        asset_id: AssetId,
        event: FeedEvent,
        as_of: chrono::DateTime<Utc>,
    ) {
        self.apply_event(&asset_id, event, as_of);

        let view = basket::evaluate(&self.markets, &self.books, self.settings.threshold);
        let outcome = self.trader.step(&self.markets, &view, as_of);

        if let (Some(signal), Some(projector)) = (&outcome.signal, self.projector.as_mut()) {
            projector
                .insert_signal(
                    signal.event_id,
                    signal.as_of,
                    &signal.kind,
                    signal.edge,
                    signal.detail.clone(),
                )
                .await;
        }

        if let Some(projector) = self.projector.as_mut() {
            let tops = self.current_tops();
            projector
                .maybe_flush(&self.markets, &tops, self.settings.event_id, self.trader.pnl())
                .await;
        }

        self.maybe_print(&view);
    }

    fn apply_event(&mut self, asset_id: &AssetId, event: FeedEvent, as_of: chrono::DateTime<Utc>) {
        self.books.with_book(asset_id, |book| match event {
            FeedEvent::Snapshot { bids, asks, raw } => {
                book.apply_snapshot(&bids, &asks, as_of, Some(raw));
            }
            FeedEvent::Top {
                best_bid,
                best_ask,
                raw,
            } => {
                book.apply_top(best_bid, best_ask, as_of, Some(raw));
            }
            FeedEvent::Changes { changes, raw } => {
                book.apply_changes(&changes, as_of, Some(raw));
            }
            FeedEvent::Unknown { raw } => {
                // Fall back to scanning `raw` for bids/asks.
                let bids = raw.get("bids").and_then(|v| v.as_array());
                let asks = raw.get("asks").and_then(|v| v.as_array());
                if let (Some(_), Some(_)) = (bids, asks) {
                    let parsed = crate::feed::parse_message(&raw);
                    for (_, ev) in parsed {
                        if let FeedEvent::Snapshot {
                            bids,
                            asks,
                            raw: inner_raw,
                        } = ev
                        {
                            book.apply_snapshot(&bids, &asks, as_of, Some(inner_raw));
                        }
                    }
                }
            }
        });
    }

    fn current_tops(&self) -> HashMap<AssetId, Top> {
        let mut out = HashMap::with_capacity(self.asset_ids.len());
        for asset_id in &self.asset_ids {
            if let Some(top) = self.books.top(asset_id) {
                out.insert(asset_id.clone(), top);
            }
        }
        out
    }

    fn maybe_print(&mut self, view: &BasketView) {
        let now = Instant::now();
        let due = match self.last_print {
            None => true,
            Some(last) => {
                now.duration_since(last) >= Duration::from_secs(self.settings.print_interval_s.max(1))
            }
        };
        if !due {
            return;
        }
        self.last_print = Some(now);

        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let sum_s = view
            .sum_yes_ask
            .map(|s| s.to_string())
            .unwrap_or_else(|| "NA".to_string());
        let cond_s = if view.cond_open {
            "YES"
        } else if !view.cond_ready {
            "WAIT"
        } else {
            "NO"
        };
        let pos_s = if self.trader.is_open() { "OPEN" } else { "FLAT" };
        let pnl = self.trader.pnl();
        let unrealized_s = pnl
            .unrealized_pnl
            .map(|u| u.to_string())
            .unwrap_or_else(|| "NA".to_string());

        info!(
            %ts,
            sum_yes_ask = %sum_s,
            threshold = %self.settings.threshold,
            condition = cond_s,
            position = pos_s,
            realized_pnl = %pnl.realized_pnl,
            unrealized_pnl = %unrealized_s,
            "basket tick"
        );

        for market in &self.markets {
            if let Some(pm) = view.per_market.get(&market.market_id) {
                info!(
                    market_id = market.market_id,
                    question = %market.question,
                    yes_bid = ?fmt(pm.yes_bid),
                    yes_ask = ?fmt(pm.yes_ask),
                    no_bid = ?fmt(pm.no_bid),
                    no_ask = ?fmt(pm.no_ask),
                    "market top"
                );
            }
        }
    }
}

fn fmt(v: Option<Decimal>) -> String {
    v.map(|d| d.to_string()).unwrap_or_else(|| "NA".to_string())
}
