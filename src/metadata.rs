//! Metadata collaborator — resolves a `market_id` into the asset
//! identifiers of its YES/NO sides.
//!
//! This sits outside the core arbitrage engineering, but the binary
//! needs a concrete implementation to start up. It touches no book
//! state and sits entirely outside the event pipeline.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::errors::ArbError;
use crate::model::MarketDescriptor;

#[derive(Debug, Deserialize)]
struct GammaMarket {
    question: Option<String>,
    #[serde(rename = "clobTokenIds")]
    clob_token_ids: Option<Value>,
    outcomes: Option<Value>,
}

/// Thin synchronous-shaped (but async, since the runtime is tokio)
/// client for the Gamma markets API.
pub struct GammaClient {
    base_url: String,
    client: Client,
}

impl GammaClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Resolve one market id into its descriptor, pairing the
    /// case-insensitive "yes"/"no" entries of `outcomes` into the
    /// matching indices of `clobTokenIds`. Both fields may arrive as
    /// JSON-encoded strings and are decoded accordingly.
    pub async fn get_market(
        &self,
        market_id: i64,
        position: usize,
    ) -> Result<MarketDescriptor, ArbError> {
        let url = format!("{}/markets/{}", self.base_url, market_id);
        let resp = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ArbError::Startup(format!("gamma request failed for market {market_id}: {e}")))?;

        if !resp.status().is_success() {
            return Err(ArbError::Startup(format!(
                "gamma returned {} for market {market_id}",
                resp.status()
            )));
        }

        let market: GammaMarket = resp
            .json()
            .await
            .map_err(|e| ArbError::Startup(format!("gamma response for market {market_id} not valid JSON: {e}")))?;

        let question = market.question.unwrap_or_default();
        let clob_ids = decode_string_array(market.clob_token_ids)
            .ok_or_else(|| ArbError::Startup(format!("market {market_id} clobTokenIds missing or not an array")))?;
        let outcomes = decode_string_array(market.outcomes)
            .ok_or_else(|| ArbError::Startup(format!("market {market_id} outcomes missing or not an array")))?;

        if clob_ids.len() < 2 {
            return Err(ArbError::Startup(format!(
                "market {market_id} clobTokenIds has fewer than 2 entries: {clob_ids:?}"
            )));
        }
        if outcomes.len() < 2 {
            return Err(ArbError::Startup(format!(
                "market {market_id} outcomes has fewer than 2 entries: {outcomes:?}"
            )));
        }
        if outcomes.len() != clob_ids.len() {
            return Err(ArbError::Startup(format!(
                "market {market_id} outcomes/clobTokenIds length mismatch: {} vs {}",
                outcomes.len(),
                clob_ids.len()
            )));
        }

        if outcomes.len() > 2 {
            warn!(
                market_id,
                outcomes = ?outcomes,
                "market has more than two outcomes; basket arbitrage assumes mutually exclusive binary markets"
            );
        }

        let yes_idx = outcomes.iter().position(|o| o.eq_ignore_ascii_case("yes"));
        let no_idx = outcomes.iter().position(|o| o.eq_ignore_ascii_case("no"));
        let (Some(yes_idx), Some(no_idx)) = (yes_idx, no_idx) else {
            return Err(ArbError::Startup(format!(
                "market {market_id} outcomes are not a Yes/No pair: {outcomes:?}"
            )));
        };

        Ok(MarketDescriptor {
            market_id,
            question,
            yes_asset_id: clob_ids[yes_idx].clone(),
            no_asset_id: clob_ids[no_idx].clone(),
            position,
        })
    }
}

/// `outcomes`/`clobTokenIds` may arrive either as a real JSON array or as
/// a JSON-encoded string containing one (Gamma has been observed to
/// return both shapes).
fn decode_string_array(value: Option<Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        ),
        Value::String(s) => {
            let parsed: Value = serde_json::from_str(&s).ok()?;
            decode_string_array(Some(parsed))
        }
        _ => None,
    }
}

/// Resolves every configured market id in order, so that
/// `MarketDescriptor::position` reflects configuration order.
pub async fn resolve_markets(
    client: &GammaClient,
    market_ids: &[i64],
) -> Result<Vec<MarketDescriptor>, ArbError> {
    let mut out = Vec::with_capacity(market_ids.len());
    for (position, &market_id) in market_ids.iter().enumerate() {
        out.push(client.get_market(market_id, position).await?);
    }
    Ok(out)
}
