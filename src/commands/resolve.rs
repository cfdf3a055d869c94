//! Visitor resolution command implementation.

use crate::config::OutputFormat;
use crate::country::{CountryCode, VisitorContext};
use crate::engine::{PricingEngine, ShippingUpdate};
use crate::format::Formatter;
use crate::pricing::CurrencyCode;
use serde::{Deserialize, Serialize};

/// Everything resolved for a visitor apart from product prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub country: Option<CountryCode>,
    pub currency: CurrencyCode,
    pub css: String,
    pub style_block: String,
    pub shipping: Option<ShippingUpdate>,
    pub postcode_label: Option<String>,
    /// `Set-Cookie` value when the selection must be persisted
    pub set_cookie: Option<String>,
}

/// Shows country, currency, styling and shipping for one visitor.
pub struct ResolveCommand<'a> {
    engine: &'a PricingEngine,
    format: OutputFormat,
}

impl<'a> ResolveCommand<'a> {
    pub fn new(engine: &'a PricingEngine, format: OutputFormat) -> Self {
        Self { engine, format }
    }

    /// Runs every visitor-level resolution.
    pub async fn resolve(&self, ctx: &mut VisitorContext) -> Resolution {
        let css = self.engine.effective_css(ctx).await;

        Resolution {
            country: self.engine.country(ctx).await,
            currency: self.engine.effective_currency(ctx).await,
            style_block: self.engine.style_block(ctx).await,
            css,
            shipping: self.engine.shipping_update(ctx).await,
            postcode_label: self.engine.postcode_label(ctx).await.map(str::to_string),
            set_cookie: ctx.selection_update().map(|s| s.cookie_header()),
        }
    }

    /// Resolves and returns formatted output.
    pub async fn execute(&self, ctx: &mut VisitorContext) -> String {
        let resolution = self.resolve(ctx).await;
        Formatter::new(self.format).format_resolution(&resolution)
    }
}
