//! Strategy chain orchestration.
//!
//! The resolver walks its `(strategy, timeout)` entries in fixed order, runs
//! the extractor over each fetched document, and stops at the first success.
//! Failures are collected per strategy so an exhausted chain reports every
//! layer's reason, not just the last. A strategy is never retried.

use std::sync::Arc;
use std::time::Duration;

use pricecheck_core::{PriceQuantity, ProductQuery, Source};
use serde::Serialize;

use crate::extract::{ExtractionFailure, Extractor};
use crate::fetch::{FetchError, FetchStrategy};

/// Why one strategy in the chain did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractionFailure),
}

/// A strategy's failure, tagged with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: String,
    pub error: StrategyError,
}

impl StrategyFailure {
    /// The page loaded with its result grid, but listed nothing for the query.
    pub fn is_item_not_found(&self) -> bool {
        matches!(self.error, StrategyError::Extract(ExtractionFailure::ItemNotFound { .. }))
    }
}

impl Serialize for StrategyFailure {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("StrategyFailure", 2)?;
        state.serialize_field("strategy", &self.strategy)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// Result of walking the chain once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Success { value: PriceQuantity, source: Source },
    /// Every strategy failed; one entry per strategy, in chain order.
    Failure(Vec<StrategyFailure>),
}

impl ResolutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ResolutionOutcome::Success { .. })
    }
}

struct ChainEntry {
    strategy: Arc<dyn FetchStrategy>,
    timeout: Duration,
}

/// Ordered fallback chain over fetch strategies.
pub struct Resolver {
    chain: Vec<ChainEntry>,
    extractor: Arc<dyn Extractor>,
}

impl Resolver {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self { chain: Vec::new(), extractor }
    }

    /// Append a strategy with its own time budget. Order of calls is chain order.
    pub fn with_strategy(mut self, strategy: Arc<dyn FetchStrategy>, timeout: Duration) -> Self {
        self.chain.push(ChainEntry { strategy, timeout });
        self
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.chain.iter().map(|entry| entry.strategy.name().to_string()).collect()
    }

    /// Walk the chain for `query`.
    pub async fn resolve(&self, query: &ProductQuery) -> ResolutionOutcome {
        let mut failures = Vec::with_capacity(self.chain.len());

        for entry in &self.chain {
            let name = entry.strategy.name();
            tracing::debug!(product = %query, strategy = name, timeout_ms = entry.timeout.as_millis() as u64, "trying strategy");

            match self.attempt(entry, query).await {
                Ok((value, url)) => {
                    tracing::info!(
                        product = %query,
                        strategy = name,
                        price = %value.price,
                        quantity = %value.quantity,
                        "price resolved"
                    );
                    return ResolutionOutcome::Success { value, source: Source::new(name, url) };
                }
                Err(error) => {
                    tracing::warn!(product = %query, strategy = name, error = %error, "strategy failed");
                    failures.push(StrategyFailure { strategy: name.to_string(), error });
                }
            }
        }

        if self.chain.is_empty() {
            tracing::warn!(product = %query, "no fetch strategies configured");
        }

        ResolutionOutcome::Failure(failures)
    }

    async fn attempt(&self, entry: &ChainEntry, query: &ProductQuery) -> Result<(PriceQuantity, String), StrategyError> {
        // Outer bound in case a strategy ignores the timeout it was handed.
        let doc = tokio::time::timeout(entry.timeout, entry.strategy.fetch(query, entry.timeout))
            .await
            .map_err(|_| FetchError::timeout(entry.timeout))??;

        let value = self.extractor.extract(&doc.html, query)?;
        Ok((value, doc.url.to_string()))
    }
}
