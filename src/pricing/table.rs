//! Exchange rates, per-country price overrides, and price resolution.

use super::{decimal_from_value, Money, ProductId};
use crate::config::parse_json_table;
use crate::country::CountryCode;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Product meta key prefix for per-country override prices (`_price_CA`).
pub const PRICE_META_PREFIX: &str = "_price_";

/// Returns the product meta key holding the override price for `country`.
pub fn price_meta_key(country: &CountryCode) -> String {
    format!("{}{}", PRICE_META_PREFIX, country)
}

/// Positive multipliers per country. Absent countries multiply by one.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRateTable {
    rates: BTreeMap<CountryCode, Decimal>,
}

impl ExchangeRateTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from the admin JSON blob, e.g. `{"US":1, "CA":1.25}`.
    ///
    /// Malformed JSON yields an empty table. Rates that are not positive
    /// numbers are dropped so they fall back to a multiplier of one.
    pub fn from_json(raw: &str) -> Self {
        let mut table = Self::new();

        for (key, value) in parse_json_table(raw, "exchange_rates") {
            let Ok(country) = CountryCode::parse(&key) else {
                warn!("Skipping exchange rate with invalid country '{}'", key);
                continue;
            };
            if !table.insert(country.clone(), decimal_from_value(&value).unwrap_or_default()) {
                warn!("Skipping non-positive exchange rate for {}: {}", country, value);
            }
        }

        table
    }

    /// Inserts a rate, returning false (and storing nothing) unless it is positive.
    pub fn insert(&mut self, country: CountryCode, rate: Decimal) -> bool {
        if rate <= Decimal::ZERO {
            return false;
        }
        self.rates.insert(country, rate);
        true
    }

    /// Returns the multiplier for `country`, defaulting to one.
    pub fn rate_for(&self, country: &CountryCode) -> Decimal {
        self.rates.get(country).copied().unwrap_or(Decimal::ONE)
    }

    /// Configured countries in key order.
    pub fn countries(&self) -> impl Iterator<Item = &CountryCode> {
        self.rates.keys()
    }

    /// Number of configured rates.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Returns true when no rate is configured.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Admin-set base prices per (product, country).
#[derive(Debug, Clone, Default)]
pub struct PriceOverrideTable {
    prices: HashMap<ProductId, BTreeMap<CountryCode, Decimal>>,
}

impl PriceOverrideTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects override prices from product meta.
    ///
    /// Only keys of the form `_price_<CC>` are read; empty or unparseable
    /// values are not stored.
    pub fn from_product_meta(products: &BTreeMap<String, BTreeMap<String, Value>>) -> Self {
        let mut table = Self::new();

        for (product_id, meta) in products {
            for (key, value) in meta {
                let Some(suffix) = key.strip_prefix(PRICE_META_PREFIX) else {
                    continue;
                };
                let Ok(country) = CountryCode::parse(suffix) else {
                    warn!("Product {}: ignoring meta key '{}'", product_id, key);
                    continue;
                };
                match decimal_from_value(value) {
                    Some(price) => table.insert(ProductId::new(product_id.as_str()), country, price),
                    None => debug!("Product {}: no usable price in {}", product_id, key),
                }
            }
        }

        table
    }

    /// Stores an override price as-is; [`get`](Self::get) filters unusable ones.
    pub fn insert(&mut self, product_id: ProductId, country: CountryCode, price: Decimal) {
        self.prices.entry(product_id).or_default().insert(country, price);
    }

    /// Returns the override for the pair, if one is usable.
    ///
    /// Zero and negative prices count as "no override".
    pub fn get(&self, product_id: &ProductId, country: &CountryCode) -> Option<Decimal> {
        self.prices
            .get(product_id)
            .and_then(|by_country| by_country.get(country))
            .copied()
            .filter(|price| *price > Decimal::ZERO)
    }

    /// Number of products with at least one override.
    pub fn product_count(&self) -> usize {
        self.prices.len()
    }
}

/// Resolves the price a visitor from a given country pays.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    rates: ExchangeRateTable,
    overrides: PriceOverrideTable,
}

impl PricingTable {
    /// Combines exchange rates and override prices.
    pub fn new(rates: ExchangeRateTable, overrides: PriceOverrideTable) -> Self {
        Self { rates, overrides }
    }

    /// Returns the exchange-rate table.
    pub fn rates(&self) -> &ExchangeRateTable {
        &self.rates
    }

    /// Returns the override price table.
    pub fn overrides(&self) -> &PriceOverrideTable {
        &self.overrides
    }

    /// Returns the override multiplied by the country's rate, if an override exists.
    ///
    /// A product too large to represent counts as no override.
    pub fn override_for(&self, product_id: &ProductId, country: &CountryCode) -> Option<Money> {
        let price = self.overrides.get(product_id, country)?;
        let rate = self.rates.rate_for(country);

        let converted = price.checked_mul(rate);
        if converted.is_none() {
            warn!(
                "Override {} x rate {} for {} in {} overflows, using base price",
                price, rate, product_id, country
            );
        }
        converted
    }

    /// Price for a product in a country.
    ///
    /// An override is multiplied by the exchange rate. Without one the base
    /// price is returned as-is, with no rate applied.
    pub fn price_for(&self, product_id: &ProductId, country: &CountryCode, base_price: Money) -> Money {
        self.override_for(product_id, country).unwrap_or(base_price)
    }
}
