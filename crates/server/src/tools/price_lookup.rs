//! price_lookup tool implementation.
//!
//! Resolves the current price and pack size of a product, cache first.
//! Scraping failures are never tool errors: the response always carries a
//! `name`, `price` and `quantity`, with sentinels standing in for missing data.

use pricecheck_client::{LookupOrigin, PriceLookup, PriceService};
use pricecheck_core::{Error, Source};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for the price_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PriceLookupParams {
    /// Product name, e.g. "tomato" or "Green Chilli".
    pub name: String,

    /// Skip the cache and resolve from the storefront.
    #[serde(default)]
    pub force_refresh: bool,
}

/// One strategy's reason for failing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FailureOutput {
    pub strategy: String,
    pub error: String,
}

/// Output structure for the price_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PriceLookupOutput {
    /// Capitalized product name.
    pub name: String,
    pub price: String,
    pub quantity: String,
    /// One of "cache", "resolved", "not_listed", "unavailable" or "unrecognized".
    pub origin: String,
    /// Strategy and address the value was taken from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// RFC 3339 time of the cached resolution, for cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    /// Per-strategy failures when every strategy failed.
    pub failures: Vec<FailureOutput>,
}

impl From<PriceLookup> for PriceLookupOutput {
    fn from(lookup: PriceLookup) -> Self {
        let origin = lookup.origin.label().to_string();
        let (source, resolved_at, failures) = match lookup.origin {
            LookupOrigin::Cache { resolved_at, source } => {
                (Some(source), Some(resolved_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)), Vec::new())
            }
            LookupOrigin::Resolved { source } => (Some(source), None, Vec::new()),
            LookupOrigin::NotListed { failures } | LookupOrigin::Unavailable { failures } => (
                None,
                None,
                failures
                    .into_iter()
                    .map(|f| FailureOutput { strategy: f.strategy, error: f.error.to_string() })
                    .collect(),
            ),
            LookupOrigin::Unrecognized => (None, None, Vec::new()),
        };

        Self {
            name: lookup.name,
            price: lookup.value.price,
            quantity: lookup.value.quantity,
            origin,
            source,
            resolved_at,
            failures,
        }
    }
}

/// Implementation of the price_lookup tool.
pub async fn lookup_impl(service: &PriceService, params: PriceLookupParams) -> Result<CallToolResult, McpError> {
    if params.name.trim().is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".into()).into());
    }

    let lookup = service.lookup(&params.name, params.force_refresh).await;
    json_result(&PriceLookupOutput::from(lookup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{EMPTY_GRID_PAGE, StaticPage, TOMATO_PAGE, body, service_with};
    use pricecheck_core::ProductQuery;

    fn params(name: &str, force_refresh: bool) -> PriceLookupParams {
        PriceLookupParams { name: name.into(), force_refresh }
    }

    #[tokio::test]
    async fn test_lookup_empty_name() {
        let page = StaticPage::new(TOMATO_PAGE);
        let (service, _db) = service_with(page.clone()).await;

        let err = lookup_impl(&service, params("  ", false)).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert_eq!(page.calls(), 0);
    }

    #[tokio::test]
    async fn test_lookup_resolves_then_hits_cache() {
        let page = StaticPage::new(TOMATO_PAGE);
        let (service, db) = service_with(page.clone()).await;

        let first = body(&lookup_impl(&service, params("tomato", false)).await.unwrap());
        assert_eq!(first["name"], "Tomato");
        assert_eq!(first["price"], "₹40");
        assert_eq!(first["quantity"], "500 g");
        assert_eq!(first["origin"], "resolved");
        assert_eq!(first["source"]["strategy"], "http");
        assert!(first.get("resolved_at").is_none());

        let second = body(&lookup_impl(&service, params("Tomato", false)).await.unwrap());
        assert_eq!(second["origin"], "cache");
        assert_eq!(second["price"], "₹40");
        assert!(second["resolved_at"].is_string());

        assert_eq!(page.calls(), 1);
        assert!(db.get_price(&ProductQuery::new("tomato")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lookup_force_refresh() {
        let page = StaticPage::new(TOMATO_PAGE);
        let (service, _db) = service_with(page.clone()).await;

        lookup_impl(&service, params("tomato", false)).await.unwrap();
        let refreshed = body(&lookup_impl(&service, params("tomato", true)).await.unwrap());

        assert_eq!(refreshed["origin"], "resolved");
        assert_eq!(page.calls(), 2);
    }

    #[tokio::test]
    async fn test_lookup_not_listed_is_not_an_error() {
        let (service, db) = service_with(StaticPage::new(EMPTY_GRID_PAGE)).await;

        let output = body(&lookup_impl(&service, params("xyzzy", false)).await.unwrap());

        assert_eq!(output["name"], "Xyzzy");
        assert_eq!(output["price"], "N/A");
        assert_eq!(output["quantity"], "N/A");
        assert_eq!(output["origin"], "not_listed");
        assert_eq!(output["failures"][0]["strategy"], "http");
        assert_eq!(output["failures"][0]["error"], "no listed item for xyzzy");
        assert_eq!(db.count_prices().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lookup_blocked_page_is_unavailable() {
        let (service, db) = service_with(StaticPage::new("<html><body>Access denied</body></html>")).await;

        let output = body(&lookup_impl(&service, params("tomato", false)).await.unwrap());

        assert_eq!(output["price"], "unavailable");
        assert_eq!(output["quantity"], "unavailable");
        assert_eq!(output["origin"], "unavailable");
        assert!(output["failures"][0]["error"].as_str().unwrap().starts_with("structure not found"));
        assert_eq!(db.count_prices().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lookup_unrecognized_sentinel() {
        let page = StaticPage::new(TOMATO_PAGE);
        let (service, _db) = service_with(page.clone()).await;

        let output = body(&lookup_impl(&service, params("Not a fruit or vegetable", false)).await.unwrap());
        assert_eq!(output["origin"], "unrecognized");
        assert_eq!(output["price"], "unavailable");
        assert_eq!(page.calls(), 0);
    }
}
