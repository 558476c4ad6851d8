//! Search address construction.

use pricecheck_core::ProductQuery;
use pricecheck_core::config::QUERY_PLACEHOLDER;
use url::form_urlencoded;

/// Error type for search address construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty query")]
    Empty,

    #[error("search template lacks {{query}} placeholder")]
    MissingPlaceholder,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Form-encode a normalized query for use inside a query string.
///
/// Spaces become `+`; everything outside the unreserved set is percent-encoded.
pub fn encode_query(query: &ProductQuery) -> String {
    form_urlencoded::byte_serialize(query.as_str().as_bytes()).collect()
}

/// Build the storefront search address for `query` from `template`.
///
/// Steps:
/// 1. Reject empty queries and templates without `{query}`
/// 2. Substitute the form-encoded query
/// 3. Parse, require http(s), drop any fragment
pub fn search_url(template: &str, query: &ProductQuery) -> Result<url::Url, UrlError> {
    if query.is_empty() {
        return Err(UrlError::Empty);
    }
    if !template.contains(QUERY_PLACEHOLDER) {
        return Err(UrlError::MissingPlaceholder);
    }

    let filled = template.trim().replace(QUERY_PLACEHOLDER, &encode_query(query));
    let mut parsed = url::Url::parse(&filled).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
