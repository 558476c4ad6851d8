//! Core types and shared functionality for pricecheck.
//!
//! This crate provides:
//! - Price value types and product-name normalization
//! - Price cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod price;

pub use cache::{CacheDb, CacheStatus, CacheStore, PriceCache};
pub use config::{AppConfig, ConfigError, SelectorConfig};
pub use error::Error;
pub use price::{CacheRecord, NOT_AVAILABLE, PriceQuantity, ProductQuery, Source, UNAVAILABLE};
