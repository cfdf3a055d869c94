//! Cart recompute command implementation.

use crate::config::OutputFormat;
use crate::country::VisitorContext;
use crate::engine::{LineItem, PricingEngine};
use crate::format::Formatter;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Recomputes every line of a cart for one visitor.
pub struct CartCommand<'a> {
    engine: &'a PricingEngine,
    format: OutputFormat,
}

impl<'a> CartCommand<'a> {
    pub fn new(engine: &'a PricingEngine, format: OutputFormat) -> Self {
        Self { engine, format }
    }

    /// Reads cart lines from a JSON file and returns the formatted totals.
    pub async fn execute(&self, path: &Path, ctx: &mut VisitorContext) -> Result<String> {
        let lines = load_lines(path)?;
        Ok(self.execute_lines(lines, ctx).await)
    }

    /// Prices already-loaded lines.
    pub async fn execute_lines(&self, lines: Vec<LineItem>, ctx: &mut VisitorContext) -> String {
        info!("Recomputing {} cart lines", lines.len());

        let cart = self.engine.price_cart(lines, ctx).await;
        Formatter::new(self.format).format_cart(&cart)
    }
}

/// Loads cart lines: a JSON array of `{"product_id", "quantity", "base_price"}`.
pub fn load_lines(path: &Path) -> Result<Vec<LineItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cart file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cart file: {}", path.display()))
}
