//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    PriceLookupParams,
    cache::{CacheGetParams, get_impl},
    health_impl, lookup_impl,
};

use pricecheck_client::PriceService;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for pricecheck.
#[derive(Clone)]
pub struct PricecheckServer {
    tool_router: ToolRouter<Self>,
    service: Arc<PriceService>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PricecheckServer {
    /// Create a new server handler around a shared price service.
    pub fn new(service: Arc<PriceService>) -> Self {
        Self { tool_router: Self::tool_router(), service }
    }

    /// Look up the current price and pack size of a grocery product.
    #[tool(
        description = "Look up the current price and pack size of a product. Serves a cached value younger than the freshness window unless force_refresh is set. Returns {name, price, quantity, origin}; price and quantity are \"N/A\" when the storefront lists no such product and \"unavailable\" when it could not be reached or read."
    )]
    async fn price_lookup(&self, params: Parameters<PriceLookupParams>) -> Result<CallToolResult, McpError> {
        lookup_impl(&self.service, params.0).await
    }

    #[tool(description = "Get the stored price record for a product, regardless of age. Errors with CACHE_MISS if none.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.service, params.0).await
    }

    #[tool(description = "Report cache connectivity and the configured fetch strategies.")]
    async fn health(&self) -> Result<CallToolResult, McpError> {
        health_impl(&self.service).await
    }
}

impl ServerHandler for PricecheckServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "pricecheck".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{StaticPage, TOMATO_PAGE, service_with};

    #[tokio::test]
    async fn test_lists_all_tools() {
        let (service, _db) = service_with(StaticPage::new(TOMATO_PAGE)).await;
        let server = PricecheckServer::new(service);

        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();

        assert_eq!(names, vec!["cache_get", "health", "price_lookup"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let (service, _db) = service_with(StaticPage::new(TOMATO_PAGE)).await;
        let info = PricecheckServer::new(service).get_info();
        assert_eq!(info.server_info.name, "pricecheck");
        assert!(info.capabilities.tools.is_some());
    }
}
