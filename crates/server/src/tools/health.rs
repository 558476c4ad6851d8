//! health tool implementation.

use pricecheck_client::PriceService;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output structure for the health tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthOutput {
    /// Always "healthy" while the server answers; cache trouble only degrades.
    pub status: String,
    /// "connected", "disconnected" or "disabled".
    pub cache: String,
    /// Strategy names in chain order.
    pub strategies: Vec<String>,
}

/// Implementation of the health tool.
pub async fn health_impl(service: &PriceService) -> Result<CallToolResult, McpError> {
    let report = service.health().await;
    json_result(&HealthOutput {
        status: "healthy".into(),
        cache: report.cache.as_str().to_string(),
        strategies: report.strategies,
    })
}
