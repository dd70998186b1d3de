//! Error kinds for the basket-arbitrage pipeline.
//!
//! Paper-trader skips (open/close attempted with a leg price missing)
//! are deliberately not a variant here — that's a no-op branch, not an
//! error, so it never leaves `paper::PaperTrader` as a `Result::Err`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArbError {
    /// Kind 1: malformed JSON frame, non-JSON frame, unrecognized shape,
    /// decode failure. Recovery: drop the event, continue.
    #[error("feed error: {0}")]
    Feed(String),

    /// Kind 2: connection loss, receive timeout, send failure. Recovery:
    /// terminate the subscription, reconnect after a delay.
    #[error("transport error: {0}")]
    Transport(String),

    /// Kind 3: any database write failure. Recovery: close and reopen
    /// the handle; the next flush rewrites `latest`/`pnl` idempotently.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Kind 4: metadata lookup failure, missing yes/no outcomes,
    /// unreachable database when writes are enabled. Fatal at startup.
    #[error("startup error: {0}")]
    Startup(String),
}
