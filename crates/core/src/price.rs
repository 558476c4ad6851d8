//! Price lookup value types.
//!
//! `ProductQuery` is the normalized identity shared by the resolver and the
//! cache; `PriceQuantity` is the value they exchange.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for a field the page did not expose.
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder for a field that could not be resolved at all.
pub const UNAVAILABLE: &str = "unavailable";

/// Names the image-analysis collaborator returns when it sees no product.
const UNRECOGNIZED_SENTINELS: &[&str] = &["unknown", "not a fruit or vegetable"];

/// Normalized product name used as the lookup identity.
///
/// Normalization lowercases, trims, and collapses internal whitespace runs to a
/// single space. It is total and idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProductQuery(String);

impl ProductQuery {
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    /// The normalized (lowercase) form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Capitalized form used as the persisted key and in responses.
    pub fn display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// False for empty names and the "no product in this image" sentinels.
    pub fn is_recognizable(&self) -> bool {
        !self.is_empty() && !UNRECOGNIZED_SENTINELS.contains(&self.0.as_str())
    }
}

impl From<String> for ProductQuery {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<ProductQuery> for String {
    fn from(query: ProductQuery) -> Self {
        query.0
    }
}

impl fmt::Display for ProductQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-fold, trim, and collapse whitespace.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A resolved (price, quantity) pair.
///
/// Either field may hold [`NOT_AVAILABLE`] on an otherwise successful
/// resolution, or [`UNAVAILABLE`] when resolution failed outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PriceQuantity {
    pub price: String,
    pub quantity: String,
}

impl PriceQuantity {
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self { price: price.into(), quantity: quantity.into() }
    }

    /// The degraded value returned when every strategy failed.
    pub fn unavailable() -> Self {
        Self::new(UNAVAILABLE, UNAVAILABLE)
    }

    /// The value returned when the storefront lists nothing for the query.
    pub fn not_listed() -> Self {
        Self::new(NOT_AVAILABLE, NOT_AVAILABLE)
    }
}

/// Which strategy produced a value, and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Source {
    /// Strategy identifier, e.g. `http` or `browser`.
    pub strategy: String,
    /// Address the strategy fetched.
    pub url: String,
}

impl Source {
    pub fn new(strategy: impl Into<String>, url: impl Into<String>) -> Self {
        Self { strategy: strategy.into(), url: url.into() }
    }
}

/// The only persisted entity: the last successful resolution for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: ProductQuery,
    pub value: PriceQuantity,
    pub resolved_at: DateTime<Utc>,
    pub source: Source,
}

impl CacheRecord {
    /// Age of the record relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.resolved_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_and_whitespace() {
        assert_eq!(normalize("  Tomato "), "tomato");
        assert_eq!(normalize("Green\t  CHILLI\n"), "green chilli");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["Tomato", "  lady's FINGER ", "Ärtor  Gröna", "\tİstanbul figs", "", "ß"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_query_equality_by_normalized_form() {
        assert_eq!(ProductQuery::new("TOMATO"), ProductQuery::new(" tomato "));
        assert_ne!(ProductQuery::new("tomato"), ProductQuery::new("potato"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(ProductQuery::new("tomato").display_name(), "Tomato");
        assert_eq!(ProductQuery::new("green CHILLI").display_name(), "Green chilli");
        assert_eq!(ProductQuery::new("").display_name(), "");
    }

    #[test]
    fn test_is_recognizable() {
        assert!(ProductQuery::new("Tomato").is_recognizable());
        assert!(!ProductQuery::new("  ").is_recognizable());
        assert!(!ProductQuery::new("Unknown").is_recognizable());
        assert!(!ProductQuery::new("Not a fruit or vegetable").is_recognizable());
    }

    #[test]
    fn test_query_serde_normalizes() {
        let query: ProductQuery = serde_json::from_str(r#"" Onion ""#).unwrap();
        assert_eq!(query.as_str(), "onion");
        assert_eq!(serde_json::to_string(&query).unwrap(), r#""onion""#);
    }

    #[test]
    fn test_price_quantity_sentinels() {
        let degraded = PriceQuantity::unavailable();
        assert_eq!(degraded.price, "unavailable");
        assert_eq!(degraded.quantity, "unavailable");

        let missing = PriceQuantity::not_listed();
        assert_eq!(missing, PriceQuantity::new("N/A", "N/A"));
        assert_ne!(missing, degraded);
    }
}
