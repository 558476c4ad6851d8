//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRICECHECK_*)
//! 2. TOML config file (if PRICECHECK_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Placeholder in `search_url` replaced by the encoded product name.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Longest accepted freshness window (one year).
pub const MAX_FRESHNESS_SECS: u64 = 365 * 24 * 60 * 60;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRICECHECK_*)
/// 2. TOML config file (if PRICECHECK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via PRICECHECK_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Whether the price cache is used at all.
    ///
    /// Set via PRICECHECK_CACHE_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Upper bound on any single cache operation, in milliseconds.
    #[serde(default = "default_cache_timeout_ms")]
    pub cache_timeout_ms: u64,

    /// Maximum age of a cached price still served without re-resolution.
    ///
    /// Set via PRICECHECK_FRESHNESS_SECS environment variable.
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,

    /// User-Agent string sent by both fetch strategies.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Storefront search address; `{query}` is replaced by the encoded name.
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Maximum bytes accepted from the lightweight strategy.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Lightweight HTTP strategy timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Whether the headless browser fallback is part of the chain.
    ///
    /// Set via PRICECHECK_RENDER_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub render_enabled: bool,

    /// Browser strategy timeout in milliseconds, including launch.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Longest wait for the result grid to appear in the rendered page before
    /// the DOM is captured as-is, in milliseconds.
    #[serde(default = "default_render_settle_ms")]
    pub render_settle_ms: u64,

    /// Delay between probes for the result grid, in milliseconds.
    #[serde(default = "default_render_poll_ms")]
    pub render_poll_ms: u64,

    /// Markup selectors for the storefront's search results page.
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// CSS selectors locating a price and pack size on a search results page.
///
/// Lists are tried in order; the first acceptable candidate wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Container holding the result grid.
    #[serde(default = "default_grid_selector")]
    pub grid: String,

    /// A single listed item within the grid.
    #[serde(default = "default_item_selector")]
    pub item: String,

    #[serde(default = "default_price_selectors")]
    pub price: Vec<String>,

    #[serde(default = "default_quantity_selectors")]
    pub quantity: Vec<String>,

    /// Substrings that mark a candidate's text as a price.
    #[serde(default = "default_currency_markers")]
    pub currency_markers: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pricecheck-cache.sqlite")
}

fn default_cache_timeout_ms() -> u64 {
    2_000
}

fn default_freshness_secs() -> u64 {
    24 * 60 * 60
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36"
        .into()
}

fn default_search_url() -> String {
    "https://www.bigbasket.com/ps/?q={query}".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_http_timeout_ms() -> u64 {
    15_000
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

fn default_render_settle_ms() -> u64 {
    10_000
}

fn default_render_poll_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_grid_selector() -> String {
    "ul.mt-5.grid.gap-6.grid-cols-9".into()
}

fn default_item_selector() -> String {
    "li".into()
}

fn default_price_selectors() -> Vec<String> {
    vec!["span.Label-sc-15v1nk5-0.Pricing___StyledLabel-sc-pldi2d-1.gJxZPQ.AypOi".into()]
}

fn default_quantity_selectors() -> Vec<String> {
    vec![
        "span.Label-sc-15v1nk5-0.PackChanger___StyledLabel-sc-newjpv-1.gJxZPQ.cWbtUx".into(),
        "span.Label-sc-15v1nk5-0.gJxZPQ.truncate".into(),
    ]
}

fn default_currency_markers() -> Vec<String> {
    ["₹", "Rs", "$", "€", "£"].into_iter().map(String::from).collect()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            grid: default_grid_selector(),
            item: default_item_selector(),
            price: default_price_selectors(),
            quantity: default_quantity_selectors(),
            currency_markers: default_currency_markers(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_enabled: true,
            cache_timeout_ms: default_cache_timeout_ms(),
            freshness_secs: default_freshness_secs(),
            user_agent: default_user_agent(),
            search_url: default_search_url(),
            max_bytes: default_max_bytes(),
            http_timeout_ms: default_http_timeout_ms(),
            render_enabled: true,
            render_timeout_ms: default_render_timeout_ms(),
            render_settle_ms: default_render_settle_ms(),
            render_poll_ms: default_render_poll_ms(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }

    pub fn render_poll(&self) -> Duration {
        Duration::from_millis(self.render_poll_ms)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    /// Freshness window as a chrono duration, for comparison with record ages.
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.freshness_secs.min(MAX_FRESHNESS_SECS) as i64)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRICECHECK_`
    /// 2. TOML file from `PRICECHECK_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// Nested fields use `__` as separator, e.g. `PRICECHECK_SELECTORS__GRID`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PRICECHECK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PRICECHECK_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
