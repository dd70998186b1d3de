//! Real-time YES-basket arbitrage watcher for sibling Polymarket
//! prediction markets.
//!
//! Watches the configured set of sibling binary markets over the CLOB
//! market-data WebSocket channel, detects when the sum of best YES asks
//! falls below the configured threshold, opens a paper "basket"
//! position, marks it to market, and closes it on reversion. Optionally
//! projects book state, arb signals, and running PnL into Postgres.

use gamma_basket_arb::config::Settings;
use gamma_basket_arb::coordinator::Coordinator;
use gamma_basket_arb::metadata::{self, GammaClient};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();
    init_logging(&settings);

    info!("=== GMP basket-arbitrage watcher ===");
    info!(
        event_id = settings.event_id,
        market_ids = ?settings.market_ids,
        threshold = %settings.threshold,
        ws_url = %settings.ws_url,
        "configuration loaded"
    );

    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "configuration error");
        }
        anyhow::bail!("configuration validation failed");
    }

    let gamma = GammaClient::new(&settings.gamma_base_url);
    let markets = metadata::resolve_markets(&gamma, &settings.market_ids)
        .await
        .map_err(|e| anyhow::anyhow!("startup failed resolving market metadata: {e}"))?;

    for market in &markets {
        info!(
            market_id = market.market_id,
            question = %market.question,
            yes_asset_id = %market.yes_asset_id,
            no_asset_id = %market.no_asset_id,
            "resolved market"
        );
    }

    let mut coordinator = Coordinator::new(settings, markets).await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::select! {
        _ = coordinator.run() => {}
        _ = shutdown => {
            info!("shutdown signal received, exiting");
        }
    }

    Ok(())
}

fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
