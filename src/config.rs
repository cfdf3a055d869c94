//! Configuration management with TOML, environment variables, and CLI overrides.
//!
//! The per-country tables are stored the way the store admin enters them: as
//! raw JSON strings. They are parsed leniently by the table types, so a typo
//! in one blob empties that table instead of failing the request.

use crate::pricing::CurrencyCode;
use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store currency used when no country override applies
    #[serde(default = "default_store_currency")]
    pub store_currency: String,

    /// ipinfo.io API token; absent or blank disables geolocation
    #[serde(default)]
    pub ipinfo_token: Option<String>,

    /// Geolocation provider base URL
    #[serde(default = "default_geo_base_url")]
    pub geo_base_url: String,

    /// Upper bound on a geolocation lookup in milliseconds
    #[serde(default = "default_geo_timeout_ms")]
    pub geo_timeout_ms: u64,

    /// How long a country selection stays sticky
    #[serde(default = "default_selection_ttl_days")]
    pub selection_ttl_days: i64,

    /// Proxy URL for provider requests (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Admin-authored JSON tables
    #[serde(default)]
    pub tables: TableSources,

    /// Product meta keyed by product id; override prices live under `_price_<CC>`
    #[serde(default)]
    pub products: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Raw JSON blobs for the per-country tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSources {
    /// Country code to positive multiplier, e.g. `{"US":1, "CA":1.25}`
    #[serde(default = "empty_table")]
    pub exchange_rates: String,

    /// Country code to currency code, e.g. `{"CA":"CAD"}`
    #[serde(default = "empty_table")]
    pub currency_map: String,

    /// Country code to CSS text plus the `others_css` fallback
    #[serde(default = "empty_table")]
    pub country_css: String,
}

impl Default for TableSources {
    fn default() -> Self {
        Self {
            exchange_rates: empty_table(),
            currency_map: empty_table(),
            country_css: empty_table(),
        }
    }
}

fn empty_table() -> String {
    "{}".to_string()
}

fn default_store_currency() -> String {
    "USD".to_string()
}

fn default_geo_base_url() -> String {
    "https://ipinfo.io".to_string()
}

fn default_geo_timeout_ms() -> u64 {
    3000
}

fn default_selection_ttl_days() -> i64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_currency: default_store_currency(),
            ipinfo_token: None,
            geo_base_url: default_geo_base_url(),
            geo_timeout_ms: default_geo_timeout_ms(),
            selection_ttl_days: default_selection_ttl_days(),
            proxy: None,
            format: OutputFormat::Table,
            tables: TableSources::default(),
            products: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("country-pricing.toml");
        if local_config.exists() {
            debug!("Found country-pricing.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("country-pricing").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(token) = std::env::var("COUNTRY_PRICING_IPINFO_TOKEN") {
            self.ipinfo_token = Some(token);
        }

        if let Ok(currency) = std::env::var("COUNTRY_PRICING_CURRENCY") {
            self.store_currency = currency;
        }

        if let Ok(timeout) = std::env::var("COUNTRY_PRICING_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.geo_timeout_ms = t;
            }
        }

        if let Ok(proxy) = std::env::var("COUNTRY_PRICING_PROXY") {
            self.proxy = Some(proxy);
        }

        self
    }

    /// Returns the geolocation token if one is set and non-blank.
    pub fn ipinfo_token(&self) -> Option<&str> {
        self.ipinfo_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Returns the geolocation timeout.
    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }

    /// Returns the sticky selection lifetime.
    pub fn selection_ttl(&self) -> TimeDelta {
        TimeDelta::try_days(self.selection_ttl_days.max(0)).unwrap_or_else(|| {
            warn!("selection_ttl_days out of range, using default");
            TimeDelta::days(default_selection_ttl_days())
        })
    }

    /// Returns the store currency, falling back to USD if misconfigured.
    pub fn store_currency(&self) -> CurrencyCode {
        CurrencyCode::parse(&self.store_currency).unwrap_or_else(|e| {
            let fallback = CurrencyCode::default();
            warn!("{}; using {}", e, fallback);
            fallback
        })
    }
}

/// Parses an admin JSON blob into an object.
///
/// Malformed JSON or a non-object value yields an empty map and a warning.
pub(crate) fn parse_json_table(raw: &str, name: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Array(items)) if items.is_empty() => Map::new(),
        Ok(other) => {
            warn!("Ignoring {} table: expected a JSON object, got {}", name, other);
            Map::new()
        }
        Err(e) => {
            warn!("Ignoring malformed {} table: {}", name, e);
            Map::new()
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store_currency, "USD");
        assert!(config.ipinfo_token.is_none());
        assert_eq!(config.geo_base_url, "https://ipinfo.io");
        assert_eq!(config.geo_timeout_ms, 3000);
        assert_eq!(config.selection_ttl_days, 30);
        assert_eq!(config.format, OutputFormat::Table);
        assert_eq!(config.tables.exchange_rates, "{}");
        assert_eq!(config.tables.currency_map, "{}");
        assert_eq!(config.tables.country_css, "{}");
        assert!(config.products.is_empty());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);

        let err = "csv".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("Unknown format"));
        assert!(err.contains("table, json, markdown"));
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
    }

    #[test]
    fn test_config_from_toml_all_fields() {
        let toml = r#"
            store_currency = "eur"
            ipinfo_token = "abc123"
            geo_base_url = "http://localhost:9000"
            geo_timeout_ms = 1500
            selection_ttl_days = 7
            proxy = "socks5://localhost:1080"
            format = "json"

            [tables]
            exchange_rates = '{"US":1, "CA":1.25}'
            currency_map = '{"CA":"CAD"}'
            country_css = '{"others_css": ""}'

            [products.hoodie]
            _price_CA = "10"
            _price_GB = 9.5
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store_currency().as_str(), "EUR");
        assert_eq!(config.ipinfo_token(), Some("abc123"));
        assert_eq!(config.geo_base_url, "http://localhost:9000");
        assert_eq!(config.geo_timeout(), Duration::from_millis(1500));
        assert_eq!(config.selection_ttl(), TimeDelta::days(7));
        assert_eq!(config.proxy.as_deref(), Some("socks5://localhost:1080"));
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.tables.exchange_rates, r#"{"US":1, "CA":1.25}"#);
        assert_eq!(config.tables.country_css, r#"{"others_css": ""}"#);

        let hoodie = &config.products["hoodie"];
        assert_eq!(hoodie["_price_CA"], Value::String("10".to_string()));
        assert!(hoodie["_price_GB"].is_number());
    }

    #[test]
    fn test_config_partial_tables() {
        let config: Config = toml::from_str("[tables]\ncurrency_map = '{\"GB\":\"GBP\"}'").unwrap();
        assert_eq!(config.tables.exchange_rates, "{}");
        assert_eq!(config.tables.currency_map, r#"{"GB":"GBP"}"#);
    }

    #[test]
    fn test_blank_token_is_absent() {
        let config = Config { ipinfo_token: Some("   ".to_string()), ..Config::default() };
        assert_eq!(config.ipinfo_token(), None);
    }

    #[test]
    fn test_invalid_store_currency_falls_back() {
        let config = Config { store_currency: "dollars".to_string(), ..Config::default() };
        assert_eq!(config.store_currency().as_str(), "USD");
    }

    #[test]
    fn test_negative_ttl_clamps_to_zero() {
        let config = Config { selection_ttl_days: -3, ..Config::default() };
        assert_eq!(config.selection_ttl(), TimeDelta::zero());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            store_currency = "GBP"
            geo_timeout_ms = 500
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.store_currency, "GBP");
        assert_eq!(config.geo_timeout_ms, 500);
    }

    #[test]
    fn test_config_from_file_not_found() {
        let result = Config::from_file("/nonexistent/path/config.toml");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_config_from_file_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();

        let err = Config::from_file(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "store_currency = \"CAD\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.store_currency, "CAD");
    }

    #[test]
    fn test_config_with_env() {
        let orig_token = std::env::var("COUNTRY_PRICING_IPINFO_TOKEN").ok();
        let orig_currency = std::env::var("COUNTRY_PRICING_CURRENCY").ok();
        let orig_timeout = std::env::var("COUNTRY_PRICING_TIMEOUT_MS").ok();

        std::env::set_var("COUNTRY_PRICING_IPINFO_TOKEN", "env-token");
        std::env::set_var("COUNTRY_PRICING_CURRENCY", "AUD");
        std::env::set_var("COUNTRY_PRICING_TIMEOUT_MS", "not_a_number");

        let config = Config::new().with_env();
        assert_eq!(config.ipinfo_token(), Some("env-token"));
        assert_eq!(config.store_currency, "AUD");
        // Invalid values are ignored
        assert_eq!(config.geo_timeout_ms, 3000);

        let restore = |key: &str, value: Option<String>| match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        };
        restore("COUNTRY_PRICING_IPINFO_TOKEN", orig_token);
        restore("COUNTRY_PRICING_CURRENCY", orig_currency);
        restore("COUNTRY_PRICING_TIMEOUT_MS", orig_timeout);
    }

    #[test]
    fn test_parse_json_table() {
        assert_eq!(parse_json_table(r#"{"CA": 1.3}"#, "t").len(), 1);
        assert!(parse_json_table("", "t").is_empty());
        assert!(parse_json_table("[]", "t").is_empty());
        assert!(parse_json_table("[1, 2]", "t").is_empty());
        assert!(parse_json_table("\"text\"", "t").is_empty());
        assert!(parse_json_table("{\"CA\": ", "t").is_empty());
    }
}
