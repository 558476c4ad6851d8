//! MCP tool implementations.
//!
//! This module contains all tools exposed by the pricecheck server.

pub mod cache;
pub mod health;
pub mod price_lookup;

pub use health::{HealthOutput, health_impl};
pub use price_lookup::{PriceLookupOutput, PriceLookupParams, lookup_impl};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use pricecheck_core::Error;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
