//! country-pricing - Per-country prices, currency and styling for a storefront
//!
//! Resolves a visitor's country from an explicit selection or IP
//! geolocation, then applies admin-configured price overrides, exchange
//! rates, currency labels and CSS consistently across one request.

pub mod commands;
pub mod config;
pub mod country;
pub mod engine;
pub mod format;
pub mod geo;
pub mod presentation;
pub mod pricing;
pub mod session;

pub use config::Config;
pub use country::{CountryCode, CountryResolver, CountrySelection, VisitorContext};
pub use engine::{CartTotals, LineItem, PricingEngine, Quote};
pub use pricing::{CatalogItem, CurrencyCode, CurrencyMap, Money, PricingTable, ProductId};
pub use presentation::PresentationRules;
