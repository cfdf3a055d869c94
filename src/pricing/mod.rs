//! Per-country prices, exchange rates, and currency codes.

pub mod currency;
pub mod table;

pub use currency::{CurrencyCode, CurrencyMap};
pub use table::{ExchangeRateTable, PriceOverrideTable, PricingTable};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Monetary amount. The currency label travels separately.
pub type Money = Decimal;

/// Catalog product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Wraps a catalog product id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A product as the host catalog hands it over: id plus default price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ProductId,
    pub base_price: Money,
}

impl CatalogItem {
    /// Creates a catalog item with its default price.
    pub fn new(id: impl Into<String>, base_price: Money) -> Self {
        Self { id: ProductId::new(id), base_price }
    }
}

/// Reads an admin-entered amount from a JSON/TOML value.
///
/// Accepts numbers and numeric strings. Empty strings, other types, and
/// unparseable text yield `None`.
pub(crate) fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_from_value() {
        assert_eq!(decimal_from_value(&json!(1.3)), Some(Decimal::new(13, 1)));
        assert_eq!(decimal_from_value(&json!(10)), Some(Decimal::new(10, 0)));
        assert_eq!(decimal_from_value(&json!("12.50")), Some(Decimal::new(1250, 2)));
        assert_eq!(decimal_from_value(&json!(" 7 ")), Some(Decimal::new(7, 0)));
        assert_eq!(decimal_from_value(&json!("1e2")), Some(Decimal::new(100, 0)));
    }

    #[test]
    fn test_decimal_from_value_rejects() {
        assert_eq!(decimal_from_value(&json!("")), None);
        assert_eq!(decimal_from_value(&json!("abc")), None);
        assert_eq!(decimal_from_value(&json!(null)), None);
        assert_eq!(decimal_from_value(&json!(true)), None);
        assert_eq!(decimal_from_value(&json!({"a": 1})), None);
    }

    #[test]
    fn test_catalog_item_serde() {
        let item: CatalogItem =
            serde_json::from_str(r#"{"id": "hoodie", "base_price": "8.00"}"#).unwrap();
        assert_eq!(item.id.as_str(), "hoodie");
        assert_eq!(item.base_price, Decimal::new(8, 0));
    }
}
