//! Library entrypoint for the YES-basket arbitrage watcher.
//!
//! Exposes all modules so integration tests can import them directly.

pub mod basket;
pub mod book;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod feed;
pub mod metadata;
pub mod model;
pub mod paper;
pub mod persistence;
pub mod stream;
