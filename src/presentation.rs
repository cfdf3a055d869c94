//! Country-specific CSS overrides and small checkout presentation rules.

use crate::config::parse_json_table;
use crate::country::CountryCode;
use askama::Template;
use std::collections::BTreeMap;
use tracing::warn;

/// Key of the fallback entry in the CSS override JSON.
pub const FALLBACK_KEY: &str = "others_css";

/// CSS text per country plus the "others" fallback.
#[derive(Debug, Clone, Default)]
pub struct PresentationRules {
    overrides: BTreeMap<CountryCode, String>,
    fallback: String,
}

impl PresentationRules {
    /// Creates rules with only a fallback entry.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self { overrides: BTreeMap::new(), fallback: fallback.into() }
    }

    /// Builds the rules from the admin JSON blob, e.g.
    /// `{"US": ".header { color: blue; }", "others_css": ""}`.
    ///
    /// Malformed JSON yields no overrides and an empty fallback.
    pub fn from_json(raw: &str) -> Self {
        let mut rules = Self::default();

        for (key, value) in parse_json_table(raw, "country_css") {
            let Some(css) = value.as_str() else {
                warn!("Skipping non-string CSS entry '{}'", key);
                continue;
            };
            if key == FALLBACK_KEY {
                rules.fallback = css.to_string();
                continue;
            }
            match CountryCode::parse(&key) {
                Ok(country) => rules.insert(country, css),
                Err(e) => warn!("Skipping CSS entry: {}", e),
            }
        }

        rules
    }

    pub fn insert(&mut self, country: CountryCode, css: impl Into<String>) {
        self.overrides.insert(country, css.into());
    }

    /// CSS for `country`, or the fallback when its entry is missing or empty.
    pub fn css_for(&self, country: &CountryCode) -> &str {
        match self.overrides.get(country) {
            Some(css) if !css.is_empty() => css,
            _ => &self.fallback,
        }
    }

    /// The "others" fallback entry. May be empty.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

/// Inline `<style>` element; `css` is HTML-escaped on render.
#[derive(Template)]
#[template(source = "<style type=\"text/css\">{{ css }}</style>", ext = "html")]
struct StyleTag<'a> {
    css: &'a str,
}

/// Wraps CSS in a `<style>` element, HTML-escaped.
pub fn style_tag(css: &str) -> String {
    StyleTag { css }.render().unwrap_or_else(|e| {
        warn!("Failed to render style block: {}", e);
        String::new()
    })
}

/// Checkout label for the postcode field, when the country renames it.
pub fn postcode_label(country: &CountryCode) -> Option<&'static str> {
    match country.as_str() {
        "US" => Some("Zipcode"),
        _ => None,
    }
}
