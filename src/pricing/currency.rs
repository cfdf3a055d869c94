//! Country to currency-code mapping.

use crate::config::parse_json_table;
use crate::country::CountryCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Three-letter ISO 4217 style currency code, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses a currency code, trimming whitespace and normalizing case.
    pub fn parse(raw: &str) -> Result<Self, CurrencyCodeError> {
        let code = raw.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyCodeError(raw.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid currency code '{0}'. Expected three letters, e.g. USD, CAD, GBP")]
pub struct CurrencyCodeError(String);

/// Admin-configured currency per country.
///
/// Only relabels the currency; amounts are never rescaled here.
#[derive(Debug, Clone, Default)]
pub struct CurrencyMap {
    currencies: BTreeMap<CountryCode, CurrencyCode>,
}

impl CurrencyMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map from the admin JSON blob, e.g. `{"CA":"CAD","GB":"GBP"}`.
    ///
    /// Malformed JSON yields an empty map; bad entries are skipped.
    pub fn from_json(raw: &str) -> Self {
        let mut map = Self::new();

        for (key, value) in parse_json_table(raw, "currency_map") {
            let Ok(country) = CountryCode::parse(&key) else {
                warn!("Skipping currency entry with invalid country '{}'", key);
                continue;
            };
            match value.as_str().map(CurrencyCode::parse) {
                Some(Ok(currency)) => map.insert(country, currency),
                _ => warn!("Skipping invalid currency for {}: {}", country, value),
            }
        }

        map
    }

    pub fn insert(&mut self, country: CountryCode, currency: CurrencyCode) {
        self.currencies.insert(country, currency);
    }

    /// Returns the override currency, or `None` to keep the store default.
    pub fn currency_for(&self, country: &CountryCode) -> Option<&CurrencyCode> {
        self.currencies.get(country)
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CountryCode {
        CountryCode::parse(s).unwrap()
    }

    #[test]
    fn test_currency_code_parsing() {
        assert_eq!(CurrencyCode::parse("cad").unwrap().as_str(), "CAD");
        assert_eq!(CurrencyCode::parse(" GBP ").unwrap().as_str(), "GBP");
        assert!(CurrencyCode::parse("").is_err());
        assert!(CurrencyCode::parse("US").is_err());
        assert!(CurrencyCode::parse("US$").is_err());

        let err = CurrencyCode::parse("dollars").unwrap_err();
        assert!(err.to_string().contains("dollars"));
    }

    #[test]
    fn test_currency_for() {
        let map = CurrencyMap::from_json(r#"{"GB":"GBP", "ca": "cad"}"#);
        assert_eq!(map.len(), 2);
        assert_eq!(map.currency_for(&code("GB")).unwrap().as_str(), "GBP");
        assert_eq!(map.currency_for(&code("CA")).unwrap().as_str(), "CAD");
        assert!(map.currency_for(&code("FR")).is_none());
    }

    #[test]
    fn test_malformed_json_is_empty() {
        let map = CurrencyMap::from_json(r#"{"GB":"GBP""#);
        assert!(map.is_empty());
        assert!(map.currency_for(&code("GB")).is_none());
    }

    #[test]
    fn test_invalid_entries_skipped() {
        let map = CurrencyMap::from_json(
            r#"{"GB":"GBP", "others":"EUR", "FR": 12, "DE": "euro", "JP": "JPY"}"#,
        );
        assert_eq!(map.len(), 2);
        assert!(map.currency_for(&code("FR")).is_none());
        assert!(map.currency_for(&code("DE")).is_none());
        assert_eq!(map.currency_for(&code("JP")).unwrap().as_str(), "JPY");
    }

    #[test]
    fn test_serde() {
        let currency: CurrencyCode = serde_json::from_str("\"eur\"").unwrap();
        assert_eq!(serde_json::to_string(&currency).unwrap(), "\"EUR\"");
    }
}
