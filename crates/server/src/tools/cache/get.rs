//! cache_get tool implementation.
//!
//! Retrieves the stored price record for a product, regardless of age.

use pricecheck_client::PriceService;
use pricecheck_core::{CacheRecord, Error, Source};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Product name; matched after normalization.
    pub name: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub name: String,
    pub price: String,
    pub quantity: String,
    /// RFC 3339 time of resolution.
    pub resolved_at: String,
    pub source: Source,
    /// Whether the record is still inside the freshness window.
    pub fresh: bool,
}

impl CacheGetOutput {
    fn new(record: CacheRecord, fresh: bool) -> Self {
        Self {
            name: record.key.display_name(),
            price: record.value.price,
            quantity: record.value.quantity,
            resolved_at: record.resolved_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            source: record.source,
            fresh,
        }
    }
}

/// Implementation of the cache_get tool.
pub async fn get_impl(service: &PriceService, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if params.name.trim().is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".into()).into());
    }

    let record = service
        .cached(&params.name)
        .await
        .ok_or_else(|| Error::CacheMiss(params.name.clone()))?;

    let fresh = service.is_fresh(&record, chrono::Utc::now());
    json_result(&CacheGetOutput::new(record, fresh))
}
