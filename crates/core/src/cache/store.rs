//! Degrading front for the price cache.
//!
//! `CacheStore` never returns an error. Backend failures and timeouts are
//! logged and read as "absent" on `get` and as a no-op on `put`, so price
//! lookups keep working (slower) with the cache down.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::connection::CacheDb;
use super::prices::PriceCache;
use crate::Error;
use crate::price::{CacheRecord, PriceQuantity, ProductQuery, Source};

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Reachability of the cache backend, as reported by health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Connected,
    Disconnected,
    Disabled,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Connected => "connected",
            CacheStatus::Disconnected => "disconnected",
            CacheStatus::Disabled => "disabled",
        }
    }
}

/// Shared, cheaply cloneable handle to the price cache.
#[derive(Clone)]
pub struct CacheStore {
    backend: Option<Arc<dyn PriceCache>>,
    op_timeout: Duration,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("enabled", &self.backend.is_some())
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl CacheStore {
    /// Wrap an already constructed backend.
    pub fn new(backend: Arc<dyn PriceCache>) -> Self {
        Self { backend: Some(backend), op_timeout: DEFAULT_OP_TIMEOUT }
    }

    /// A store that never holds anything.
    pub fn disabled() -> Self {
        Self { backend: None, op_timeout: DEFAULT_OP_TIMEOUT }
    }

    /// Bound every backend call by `op_timeout`.
    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Open the SQLite cache at `path`, falling back to a disabled store if it
    /// cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match CacheDb::open(path).await {
            Ok(db) => {
                tracing::info!(path = %path.display(), "price cache opened");
                Self::new(Arc::new(db))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "price cache unavailable; continuing without cache");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Look up the record for `key`; any failure reads as absent.
    pub async fn get(&self, key: &ProductQuery) -> Option<CacheRecord> {
        let backend = self.backend.as_ref()?;
        match self.bounded(backend.get(key)).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(product = %key, error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Upsert the record for `key`; any failure is logged and dropped.
    pub async fn put(&self, key: &ProductQuery, value: &PriceQuantity, source: &Source, now: DateTime<Utc>) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        let record = CacheRecord { key: key.clone(), value: value.clone(), resolved_at: now, source: source.clone() };
        match self.bounded(backend.put(&record)).await {
            Ok(()) => tracing::debug!(product = %key, strategy = %source.strategy, "cache record written"),
            Err(e) => tracing::warn!(product = %key, error = %e, "cache write failed; result not persisted"),
        }
    }

    /// Health view of the backend.
    pub async fn status(&self) -> CacheStatus {
        if !self.is_enabled() {
            CacheStatus::Disabled
        } else if self.is_reachable().await {
            CacheStatus::Connected
        } else {
            CacheStatus::Disconnected
        }
    }

    /// Run the backend's probe query within the operation timeout.
    pub async fn is_reachable(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };

        match self.bounded(backend.ping()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "cache ping failed");
                false
            }
        }
    }

    async fn bounded<T>(&self, op: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| Error::CacheUnavailable(format!("cache operation exceeded {}ms", self.op_timeout.as_millis())))?
    }
}
