//! SQLite-backed cache for resolved prices.
//!
//! This module provides persistent storage of the last successful resolution
//! per product using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Upsert keyed by product display name
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - A degrading `CacheStore` front that never fails a lookup

pub mod connection;
pub mod migrations;
pub mod prices;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use prices::PriceCache;
pub use store::{CacheStatus, CacheStore};
