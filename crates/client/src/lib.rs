//! Client code for pricecheck.
//!
//! This crate provides the fetch strategies, price extraction, the fallback
//! resolver, and the cache-first price service used by the server.

pub mod extract;
pub mod fetch;
#[cfg(feature = "render")]
pub mod render;
pub mod resolve;
pub mod service;

pub use extract::{ExtractionFailure, Extractor, SelectorExtractor};
pub use fetch::{FetchError, FetchStrategy, HttpConfig, HttpStrategy, RawDocument};
#[cfg(feature = "render")]
pub use render::{BrowserStrategy, RenderOptions};
pub use resolve::{ResolutionOutcome, Resolver, StrategyError, StrategyFailure};
pub use service::{HealthReport, LookupOrigin, PriceLookup, PriceService};
