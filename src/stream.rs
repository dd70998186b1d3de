//! Stream Client — WebSocket subscription, keepalive, receive-timeout
//! supervision, and normalized event fan-out.
//!
//! Models the stream as an async generator over the receive loop: a
//! single connection attempt that runs until a transport fault, then
//! returns `Err`. The Coordinator owns the reconnect loop around it —
//! the client itself never retries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::errors::ArbError;
use crate::feed::{self, FeedEvent};
use crate::model::AssetId;

/// Optional auth credentials for the subscribe frame. Included only when
/// at least one field is non-empty; the channel is otherwise
/// treated as public.
#[derive(Debug, Clone)]
pub struct ClobAuth {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

/// One normalized event with its arrival timestamp and owning asset id.
pub type StreamEvent = (DateTime<Utc>, AssetId, FeedEvent);

pub struct StreamClient {
    pub ws_url: String,
    pub ping_interval_s: u64,
    pub recv_timeout_s: u64,
}

impl StreamClient {
    pub fn new(ws_url: impl Into<String>, ping_interval_s: u64, recv_timeout_s: u64) -> Self {
        Self {
            ws_url: ws_url.into(),
            ping_interval_s,
            recv_timeout_s,
        }
    }

    /// Connects, subscribes to `asset_ids`, and forwards normalized
    /// events to `tx` until the socket errors, times out, or `tx`'s
    /// receiver is dropped. Returns `Ok(())` only on graceful shutdown
    /// (receiver dropped); any transport fault is an `Err`.
    pub async fn run(
        &self,
        asset_ids: &[AssetId],
        auth: Option<ClobAuth>,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ArbError> {
        let (ws, _resp) = tokio_tungstenite::connect_async(&self.ws_url)
            .await
            .map_err(|e| ArbError::Transport(format!("connect failed: {e}")))?;

        let (mut write, mut read) = ws.split();

        let mut subscribe = serde_json::json!({
            "assets_ids": asset_ids,
            "type": "market",
        });
        if let Some(auth) = &auth {
            if !auth.api_key.is_empty() || !auth.secret.is_empty() || !auth.passphrase.is_empty() {
                subscribe["auth"] = serde_json::json!({
                    "apiKey": auth.api_key,
                    "secret": auth.secret,
                    "passphrase": auth.passphrase,
                });
            }
        }
        write
            .send(Message::Text(subscribe.to_string().into()))
            .await
            .map_err(|e| ArbError::Transport(format!("subscribe send failed: {e}")))?;

        let ping_interval = Duration::from_secs(self.ping_interval_s.max(1));
        let keepalive = tokio::spawn(async move {
            loop {
                tokio::time::sleep(ping_interval).await;
                if write.send(Message::Text("PING".into())).await.is_err() {
                    return;
                }
            }
        });

        let recv_timeout = Duration::from_secs(self.recv_timeout_s.max(1));
        let result = self.recv_loop(&mut read, recv_timeout, &tx).await;

        keepalive.abort();
        result
    }

    async fn recv_loop(
        &self,
        read: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
        recv_timeout: Duration,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), ArbError> {
        loop {
            let next = tokio::time::timeout(recv_timeout, read.next())
                .await
                .map_err(|_| ArbError::Transport("receive timed out".to_string()))?;

            let Some(frame) = next else {
                return Err(ArbError::Transport("stream closed by peer".to_string()));
            };
            let frame = frame.map_err(|e| ArbError::Transport(format!("receive error: {e}")))?;

            let text = match frame {
                Message::Text(t) => t.to_string(),
                Message::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
                Message::Close(_) => {
                    return Err(ArbError::Transport("server sent close frame".to_string()))
                }
                _ => continue,
            };

            if text == "PING" || text == "PONG" {
                continue;
            }

            let parsed: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) => {
                    debug!("dropping non-JSON frame");
                    continue;
                }
            };

            let as_of = Utc::now();
            for (asset_id, event) in feed::parse_message(&parsed) {
                if tx.send((as_of, asset_id, event)).await.is_err() {
                    // Receiver dropped: graceful shutdown, not a fault.
                    return Ok(());
                }
            }
        }
    }
}

/// Helper for logging a transport-fault at the coordinator boundary
/// without treating it as fatal.
pub fn log_disconnect(err: &ArbError, reconnect_delay_s: u64) {
    warn!(error = %err, reconnect_delay_s, "stream disconnected, reconnecting");
}
