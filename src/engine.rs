//! Request-scoped pricing pipeline.
//!
//! Every operation resolves the visitor's country through the same
//! [`VisitorContext`], so one request sees one country, and falls back to the
//! store defaults when the country is unresolved.

use crate::config::Config;
use crate::country::{CountryCode, CountryCodeError, CountryResolver, VisitorContext};
use crate::pricing::table::price_meta_key;
use crate::pricing::{
    CatalogItem, CurrencyCode, CurrencyMap, ExchangeRateTable, Money, PriceOverrideTable,
    PricingTable, ProductId,
};
use crate::presentation::{self, PresentationRules};
use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One cart or order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Catalog price before any country adjustment
    pub base_price: Money,
    /// Unit price charged, set on every recompute
    #[serde(default)]
    pub price: Money,
    /// `price * quantity`
    #[serde(default)]
    pub subtotal: Money,
}

fn default_quantity() -> u32 {
    1
}

impl LineItem {
    /// Creates a line priced at its base price.
    pub fn new(product_id: impl Into<String>, quantity: u32, base_price: Money) -> Self {
        Self {
            product_id: ProductId::new(product_id),
            quantity,
            base_price,
            price: base_price,
            subtotal: line_subtotal(base_price, quantity),
        }
    }
}

/// `price * quantity`, saturating at [`Decimal::MAX`] on overflow.
fn line_subtotal(price: Money, quantity: u32) -> Money {
    price.checked_mul(Decimal::from(quantity)).unwrap_or_else(|| {
        warn!("Subtotal of {} x{} overflows, saturating", price, quantity);
        Decimal::MAX
    })
}

/// `total + subtotal`, saturating at [`Decimal::MAX`] on overflow.
fn add_to_total(total: Money, subtotal: Money) -> Money {
    total.checked_add(subtotal).unwrap_or_else(|| {
        warn!("Cart total overflows, saturating");
        Decimal::MAX
    })
}

/// Everything a product page needs for one visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub product_id: ProductId,
    pub country: Option<CountryCode>,
    pub base_price: Money,
    pub price: Money,
    pub currency: CurrencyCode,
    /// True when a per-country override produced the price
    pub overridden: bool,
}

/// Recomputed cart with its grand total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    pub country: Option<CountryCode>,
    pub currency: CurrencyCode,
    pub lines: Vec<LineItem>,
    pub total: Money,
}

/// Destination to push into the checkout subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingUpdate {
    pub billing_country: CountryCode,
    pub shipping_country: CountryCode,
    /// Ask the host to recompute shipping zones and rates
    pub recalculate_shipping: bool,
}

/// A country offered in the country switcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitcherEntry {
    pub country: CountryCode,
    pub rate: Decimal,
    pub currency: Option<CurrencyCode>,
    /// Product meta key holding this country's override price
    pub price_field: String,
    pub price_label: String,
}

/// Resolves prices, currency, styling and shipping destination per visitor.
pub struct PricingEngine {
    resolver: CountryResolver,
    pricing: PricingTable,
    currencies: CurrencyMap,
    presentation: PresentationRules,
    store_currency: CurrencyCode,
}

impl PricingEngine {
    /// Creates an engine from already-built parts.
    pub fn new(
        resolver: CountryResolver,
        pricing: PricingTable,
        currencies: CurrencyMap,
        presentation: PresentationRules,
        store_currency: CurrencyCode,
    ) -> Self {
        Self { resolver, pricing, currencies, presentation, store_currency }
    }

    /// Builds the engine, its tables and its geolocation provider from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = CountryResolver::from_config(config)?;
        let mut engine = Self::new(
            resolver,
            PricingTable::default(),
            CurrencyMap::default(),
            PresentationRules::default(),
            config.store_currency(),
        );
        engine.reload(config);
        Ok(engine)
    }

    /// Rebuilds every admin table from config after an admin update.
    pub fn reload(&mut self, config: &Config) {
        self.pricing = PricingTable::new(
            ExchangeRateTable::from_json(&config.tables.exchange_rates),
            PriceOverrideTable::from_product_meta(&config.products),
        );
        self.currencies = CurrencyMap::from_json(&config.tables.currency_map);
        self.presentation = PresentationRules::from_json(&config.tables.country_css);
        self.store_currency = config.store_currency();

        info!(
            "Loaded {} exchange rates, {} currencies, overrides for {} products",
            self.pricing.rates().len(),
            self.currencies.len(),
            self.pricing.overrides().product_count()
        );
    }

    /// Returns the country resolver.
    pub fn resolver(&self) -> &CountryResolver {
        &self.resolver
    }

    /// Returns the price override and exchange-rate tables.
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Returns the store's default currency.
    pub fn store_currency(&self) -> &CurrencyCode {
        &self.store_currency
    }

    /// Resolves the visitor's country.
    pub async fn country(&self, ctx: &mut VisitorContext) -> Option<CountryCode> {
        self.resolver.resolve(ctx).await
    }

    /// Records an explicit country choice for the visitor.
    pub fn select_country(
        &self,
        ctx: &mut VisitorContext,
        raw: &str,
    ) -> Result<CountryCode, CountryCodeError> {
        let country = CountryCode::parse(raw)?;
        info!("Visitor selected {}", country);
        ctx.select(country.clone(), self.resolver.selection_ttl());
        Ok(country)
    }

    /// Price shown on a product page.
    pub async fn display_price(&self, item: &CatalogItem, ctx: &mut VisitorContext) -> Money {
        self.line_item_price(&item.id, item.base_price, ctx).await
    }

    /// Price charged for one cart or order line.
    pub async fn line_item_price(
        &self,
        product_id: &ProductId,
        base_price: Money,
        ctx: &mut VisitorContext,
    ) -> Money {
        match self.country(ctx).await {
            Some(country) => self.pricing.price_for(product_id, &country, base_price),
            None => base_price,
        }
    }

    /// Recomputes every line from scratch and returns the totals.
    ///
    /// Subtotals and the total saturate at [`Decimal::MAX`] instead of overflowing.
    pub async fn recompute_lines(&self, lines: &mut [LineItem], ctx: &mut VisitorContext) -> Money {
        let mut total = Decimal::ZERO;

        for line in lines.iter_mut() {
            line.price = self.line_item_price(&line.product_id, line.base_price, ctx).await;
            line.subtotal = line_subtotal(line.price, line.quantity);
            debug!("Line {} x{}: {} -> {}", line.product_id, line.quantity, line.base_price, line.price);
            total = add_to_total(total, line.subtotal);
        }

        total
    }

    /// Recomputes an owned cart and packages it with country and currency.
    pub async fn price_cart(&self, mut lines: Vec<LineItem>, ctx: &mut VisitorContext) -> CartTotals {
        let total = self.recompute_lines(&mut lines, ctx).await;
        CartTotals {
            country: self.country(ctx).await,
            currency: self.effective_currency(ctx).await,
            lines,
            total,
        }
    }

    /// Currency code to display for the visitor.
    pub async fn effective_currency(&self, ctx: &mut VisitorContext) -> CurrencyCode {
        self.country(ctx)
            .await
            .and_then(|country| self.currencies.currency_for(&country).cloned())
            .unwrap_or_else(|| self.store_currency.clone())
    }

    /// CSS override text for the visitor.
    pub async fn effective_css(&self, ctx: &mut VisitorContext) -> String {
        match self.country(ctx).await {
            Some(country) => self.presentation.css_for(&country).to_string(),
            None => self.presentation.fallback().to_string(),
        }
    }

    /// The visitor's CSS wrapped in an escaped `<style>` element.
    pub async fn style_block(&self, ctx: &mut VisitorContext) -> String {
        presentation::style_tag(&self.effective_css(ctx).await)
    }

    /// Destination country for shipping; `None` leaves the host's untouched.
    pub async fn shipping_country(&self, ctx: &mut VisitorContext) -> Option<CountryCode> {
        self.country(ctx).await
    }

    /// Billing and shipping destination update for the checkout.
    pub async fn shipping_update(&self, ctx: &mut VisitorContext) -> Option<ShippingUpdate> {
        let country = self.shipping_country(ctx).await?;
        Some(ShippingUpdate {
            billing_country: country.clone(),
            shipping_country: country,
            recalculate_shipping: true,
        })
    }

    /// Checkout postcode label override for the visitor's country.
    pub async fn postcode_label(&self, ctx: &mut VisitorContext) -> Option<&'static str> {
        self.country(ctx).await.as_ref().and_then(presentation::postcode_label)
    }

    /// Price, currency and country for a product page in one call.
    pub async fn quote(&self, item: &CatalogItem, ctx: &mut VisitorContext) -> Quote {
        let country = self.country(ctx).await;
        let overridden = country
            .as_ref()
            .is_some_and(|c| self.pricing.override_for(&item.id, c).is_some());

        Quote {
            product_id: item.id.clone(),
            price: self.display_price(item, ctx).await,
            currency: self.effective_currency(ctx).await,
            base_price: item.base_price,
            country,
            overridden,
        }
    }

    /// Countries configured with an exchange rate, for the country switcher.
    pub fn switcher_countries(&self) -> Vec<SwitcherEntry> {
        self.pricing
            .rates()
            .countries()
            .map(|country| SwitcherEntry {
                country: country.clone(),
                rate: self.pricing.rates().rate_for(country),
                currency: self.currencies.currency_for(country).cloned(),
                price_field: price_meta_key(country),
                price_label: format!("Price for {}", country),
            })
            .collect()
    }
}
