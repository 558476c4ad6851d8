//! Price and pack-size extraction from search results markup.
//!
//! ### Algorithm
//! - Locate the result grid (the structural anchor). Missing grid is
//!   `StructureNotFound`: storefront markup changes often, so this is an
//!   expected outcome.
//! - Take the first item in document order. No ranking.
//! - Price: first candidate across the price selectors whose text carries a
//!   currency marker, else `"N/A"`.
//! - Quantity: first non-empty candidate across the quantity selectors, else
//!   `"N/A"`.
//!
//! ### Stable Abstraction
//! - The `Extractor` trait keeps the resolver independent of any one
//!   storefront; `SelectorExtractor` is driven entirely by `SelectorConfig`.

use pricecheck_core::{Error, NOT_AVAILABLE, PriceQuantity, ProductQuery, SelectorConfig};
use scraper::{ElementRef, Html, Selector};

/// Why a fetched document yielded no item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionFailure {
    /// The anchor region is absent from the page.
    #[error("structure not found: no element matches {selector}")]
    StructureNotFound { selector: String },

    /// The anchor exists but lists no items.
    #[error("no listed item for {query}")]
    ItemNotFound { query: String },
}

/// Pure markup → value extraction. No I/O.
pub trait Extractor: Send + Sync {
    fn extract(&self, markup: &str, query: &ProductQuery) -> Result<PriceQuantity, ExtractionFailure>;
}

/// Extractor configured by CSS selectors.
#[derive(Debug)]
pub struct SelectorExtractor {
    grid: Selector,
    grid_source: String,
    item: Selector,
    price: Vec<Selector>,
    quantity: Vec<Selector>,
    currency_markers: Vec<String>,
}

fn parse_selector(field: &str, css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::InvalidSelector(format!("{field} {css:?}: {e}")))
}

fn parse_all(field: &str, list: &[String]) -> Result<Vec<Selector>, Error> {
    list.iter().map(|css| parse_selector(field, css)).collect()
}

/// Element text with whitespace runs collapsed.
fn text_of(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

impl SelectorExtractor {
    /// Compile the configured selectors.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSelector` naming the first selector that fails to parse.
    pub fn new(config: &SelectorConfig) -> Result<Self, Error> {
        Ok(Self {
            grid: parse_selector("grid", &config.grid)?,
            grid_source: config.grid.clone(),
            item: parse_selector("item", &config.item)?,
            price: parse_all("price", &config.price)?,
            quantity: parse_all("quantity", &config.quantity)?,
            currency_markers: config.currency_markers.clone(),
        })
    }

    fn has_currency(&self, text: &str) -> bool {
        self.currency_markers.iter().any(|marker| text.contains(marker.as_str()))
    }

    fn first_price(&self, item: ElementRef<'_>) -> Option<String> {
        self.price
            .iter()
            .flat_map(|selector| item.select(selector))
            .map(text_of)
            .find(|text| self.has_currency(text))
    }

    fn first_quantity(&self, item: ElementRef<'_>) -> Option<String> {
        self.quantity
            .iter()
            .flat_map(|selector| item.select(selector))
            .map(text_of)
            .find(|text| !text.is_empty())
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, markup: &str, query: &ProductQuery) -> Result<PriceQuantity, ExtractionFailure> {
        let doc = Html::parse_document(markup);

        let grid = doc
            .select(&self.grid)
            .next()
            .ok_or_else(|| ExtractionFailure::StructureNotFound { selector: self.grid_source.clone() })?;

        let item = grid
            .select(&self.item)
            .next()
            .ok_or_else(|| ExtractionFailure::ItemNotFound { query: query.to_string() })?;

        let price = self.first_price(item).unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let quantity = self.first_quantity(item).unwrap_or_else(|| NOT_AVAILABLE.to_string());

        Ok(PriceQuantity { price, quantity })
    }
}
