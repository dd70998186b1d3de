//! Persistence Projector — throttled flush of book tops to `latest`/
//! `ticks`, unthrottled arb-signal inserts, and running-PnL upserts.
//! Backed by Postgres via `sqlx`; runtime-bound queries are used
//! throughout (rather than the `query!` compile-time macro) since this
//! binary does not assume a reachable database at build time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::ArbError;
use crate::model::{AssetId, MarketDescriptor, Outcome, RunningPnl, Top};

pub struct PersistenceProjector {
    pool: PgPool,
    database_url: String,
    db_interval: Duration,
    write_ticks: bool,
    last_flush: Option<Instant>,
}

impl PersistenceProjector {
    pub async fn connect(
        database_url: &str,
        db_interval_s: u64,
        write_ticks: bool,
    ) -> Result<Self, ArbError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        ensure_schema(&pool).await?;
        Ok(Self {
            pool,
            database_url: database_url.to_string(),
            db_interval: Duration::from_secs(db_interval_s.max(1)),
            write_ticks,
            last_flush: None,
        })
    }

    /// Reopens the connection pool after a write failure.
    async fn reconnect(&mut self) {
        error!("reopening database connection after write failure");
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&self.database_url)
            .await
        {
            Ok(pool) => self.pool = pool,
            Err(e) => error!(error = %e, "database reconnect failed, will retry on next flush"),
        }
    }

    fn due(&self, now: Instant) -> bool {
        match self.last_flush {
            None => true,
            Some(last) => now.duration_since(last) >= self.db_interval,
        }
    }

    /// Throttled flush of current tops plus running PnL. No-op if
    /// called before `db_interval_s` has elapsed since the last flush.
    pub async fn maybe_flush(
        &mut self,
        markets: &[MarketDescriptor],
        tops: &HashMap<AssetId, Top>,
        event_id: i64,
        pnl: RunningPnl,
    ) {
        let now = Instant::now();
        if !self.due(now) {
            return;
        }
        self.last_flush = Some(now);

        let meta = asset_metadata(markets);
        for (asset_id, top) in tops {
            let Some((market_id, outcome)) = meta.get(asset_id) else {
                continue;
            };
            if let Err(e) = self.upsert_latest(asset_id, *market_id, *outcome, top).await {
                error!(error = %e, asset_id, "latest upsert failed");
                self.reconnect().await;
                continue;
            }
            if self.write_ticks {
                if let Err(e) = self.insert_tick(asset_id, *market_id, *outcome, top).await {
                    error!(error = %e, asset_id, "tick insert failed");
                    self.reconnect().await;
                }
            }
        }

        if let Err(e) = self.upsert_pnl(event_id, pnl).await {
            error!(error = %e, event_id, "pnl upsert failed");
            self.reconnect().await;
        }
    }

    async fn upsert_latest(
        &self,
        asset_id: &str,
        market_id: i64,
        outcome: Outcome,
        top: &Top,
    ) -> Result<(), ArbError> {
        let raw = top.raw.clone().unwrap_or(Value::Null);
        sqlx::query(
            r#"
            insert into latest (asset_id, market_id, outcome, as_of, best_bid, best_ask, mid, source, raw, updated_at)
            values ($1, $2, $3, $4, $5, $6, $7, 'clob_ws', $8, now())
            on conflict (asset_id) do update set
              market_id = excluded.market_id,
              outcome = excluded.outcome,
              as_of = excluded.as_of,
              best_bid = excluded.best_bid,
              best_ask = excluded.best_ask,
              mid = excluded.mid,
              source = excluded.source,
              raw = excluded.raw,
              updated_at = now()
            "#,
        )
        .bind(asset_id)
        .bind(market_id)
        .bind(outcome.to_string())
        .bind(top.as_of.unwrap_or_else(Utc::now))
        .bind(top.best_bid)
        .bind(top.best_ask)
        .bind(top.mid())
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_tick(
        &self,
        asset_id: &str,
        market_id: i64,
        outcome: Outcome,
        top: &Top,
    ) -> Result<(), ArbError> {
        let raw = top.raw.clone().unwrap_or(Value::Null);
        sqlx::query(
            r#"
            insert into ticks (asset_id, as_of, market_id, outcome, best_bid, best_ask, mid, source, raw)
            values ($1, $2, $3, $4, $5, $6, $7, 'clob_ws', $8)
            on conflict (asset_id, as_of) do nothing
            "#,
        )
        .bind(asset_id)
        .bind(top.as_of.unwrap_or_else(Utc::now))
        .bind(market_id)
        .bind(outcome.to_string())
        .bind(top.best_bid)
        .bind(top.best_ask)
        .bind(top.mid())
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Arb-signal insert is NOT throttled — issued once per OPEN
    /// transition. Failures are logged and swallowed: a dropped signal
    /// is best-effort, not fatal.
    pub async fn insert_signal(
        &mut self,
        event_id: i64,
        as_of: DateTime<Utc>,
        kind: &str,
        edge: Decimal,
        detail: Value,
    ) {
        let result = sqlx::query(
            r#"
            insert into signals (signal_id, event_id, as_of, kind, edge, detail, created_at)
            values ($1, $2, $3, $4, $5, $6, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(as_of)
        .bind(kind)
        .bind(edge)
        .bind(detail)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(error = %e, event_id, kind, "arb signal insert failed (dropped, best-effort)");
            self.reconnect().await;
        } else {
            info!(event_id, kind, %edge, "arb signal recorded");
        }
    }

    async fn upsert_pnl(&self, event_id: i64, pnl: RunningPnl) -> Result<(), ArbError> {
        sqlx::query(
            r#"
            insert into pnl (event_id, realized_pnl, unrealized_pnl, updated_at)
            values ($1, $2, $3, now())
            on conflict (event_id) do update set
              realized_pnl = excluded.realized_pnl,
              unrealized_pnl = excluded.unrealized_pnl,
              updated_at = now()
            "#,
        )
        .bind(event_id)
        .bind(pnl.realized_pnl)
        .bind(pnl.unrealized_pnl.unwrap_or(Decimal::ZERO))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// `asset_id -> (market_id, outcome)`, assembled once from the resolved
/// market descriptors.
fn asset_metadata(markets: &[MarketDescriptor]) -> HashMap<AssetId, (i64, Outcome)> {
    let mut out = HashMap::with_capacity(markets.len() * 2);
    for market in markets {
        out.insert(market.yes_asset_id.clone(), (market.market_id, Outcome::Yes));
        out.insert(market.no_asset_id.clone(), (market.market_id, Outcome::No));
    }
    out
}

async fn ensure_schema(pool: &PgPool) -> Result<(), ArbError> {
    sqlx::query(
        r#"
        create table if not exists latest (
            asset_id text primary key,
            market_id bigint not null,
            outcome text not null,
            as_of timestamptz not null,
            best_bid numeric,
            best_ask numeric,
            mid numeric,
            source text not null,
            raw jsonb,
            updated_at timestamptz not null default now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        create table if not exists ticks (
            asset_id text not null,
            as_of timestamptz not null,
            market_id bigint not null,
            outcome text not null,
            best_bid numeric,
            best_ask numeric,
            mid numeric,
            source text not null,
            raw jsonb,
            unique (asset_id, as_of)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        create table if not exists signals (
            signal_id uuid primary key,
            event_id bigint not null,
            as_of timestamptz not null,
            kind text not null,
            edge numeric not null,
            detail jsonb,
            created_at timestamptz not null default now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        create table if not exists pnl (
            event_id bigint primary key,
            realized_pnl numeric not null,
            unrealized_pnl numeric not null,
            updated_at timestamptz not null default now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
