//! Product page quote command implementation.

use crate::config::OutputFormat;
use crate::country::VisitorContext;
use crate::engine::PricingEngine;
use crate::format::Formatter;
use crate::pricing::CatalogItem;
use tracing::info;

/// Quotes a single product for one visitor.
pub struct QuoteCommand<'a> {
    engine: &'a PricingEngine,
    format: OutputFormat,
}

impl<'a> QuoteCommand<'a> {
    pub fn new(engine: &'a PricingEngine, format: OutputFormat) -> Self {
        Self { engine, format }
    }

    /// Resolves the visitor's price and currency and returns formatted output.
    pub async fn execute(&self, item: &CatalogItem, ctx: &mut VisitorContext) -> String {
        info!("Quoting {} (base {})", item.id, item.base_price);

        let quote = self.engine.quote(item, ctx).await;
        Formatter::new(self.format).format_quote(&quote)
    }
}
