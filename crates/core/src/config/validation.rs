//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, MAX_FRESHNESS_SECS, QUERY_PLACEHOLDER};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_timeout(field: &str, value_ms: u64) -> Result<(), ConfigError> {
    if value_ms < 100 {
        return Err(invalid(field, "must be at least 100ms"));
    }
    if value_ms > 300_000 {
        return Err(invalid(field, "must not exceed 5 minutes (300000ms)"));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - a fetch timeout or the render settle wait is less than 100ms or exceeds 5 minutes
    /// - `render_poll_ms` is 0 or longer than the settle wait
    /// - `cache_timeout_ms` or `freshness_secs` is 0, or the window exceeds a year
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `user_agent` is empty
    /// - `search_url` is not http(s) or lacks the `{query}` placeholder
    /// - any selector is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_timeout("http_timeout_ms", self.http_timeout_ms)?;
        check_timeout("render_timeout_ms", self.render_timeout_ms)?;
        check_timeout("render_settle_ms", self.render_settle_ms)?;

        if self.render_poll_ms == 0 || self.render_poll_ms > self.render_settle_ms {
            return Err(invalid("render_poll_ms", "must be greater than 0 and at most render_settle_ms"));
        }

        if self.cache_timeout_ms == 0 {
            return Err(invalid("cache_timeout_ms", "must be greater than 0"));
        }

        if self.freshness_secs == 0 {
            return Err(invalid("freshness_secs", "must be greater than 0"));
        }
        if self.freshness_secs > MAX_FRESHNESS_SECS {
            return Err(invalid("freshness_secs", "must not exceed one year"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !self.search_url.contains(QUERY_PLACEHOLDER) {
            return Err(invalid("search_url", "must contain the {query} placeholder"));
        }
        match url::Url::parse(&self.search_url.replace(QUERY_PLACEHOLDER, "probe")) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(_) => return Err(invalid("search_url", "scheme must be http or https")),
            Err(e) => return Err(invalid("search_url", &e.to_string())),
        }

        let selectors = &self.selectors;
        if selectors.grid.trim().is_empty() {
            return Err(invalid("selectors.grid", "must not be empty"));
        }
        if selectors.item.trim().is_empty() {
            return Err(invalid("selectors.item", "must not be empty"));
        }
        if selectors.price.is_empty() || selectors.price.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("selectors.price", "must list at least one non-empty selector"));
        }
        if selectors.quantity.is_empty() || selectors.quantity.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("selectors.quantity", "must list at least one non-empty selector"));
        }
        if selectors.currency_markers.is_empty() {
            return Err(invalid("selectors.currency_markers", "must list at least one marker"));
        }

        if !self.cache_enabled {
            tracing::warn!("price cache disabled by configuration; every lookup will resolve");
        }

        Ok(())
    }
}
