//! Output formatting for quotes, carts and visitor resolutions (table, JSON, markdown).

use crate::commands::Resolution;
use crate::config::OutputFormat;
use crate::country::CountryCode;
use crate::engine::{CartTotals, Quote, SwitcherEntry};

const UNRESOLVED: &str = "(unresolved)";

/// Formats pricing results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a single product quote.
    pub fn format_quote(&self, quote: &Quote) -> String {
        match self.format {
            OutputFormat::Json => to_json(quote, "{}"),
            OutputFormat::Table => self.table_quote(quote),
            OutputFormat::Markdown => self.markdown_quote(quote),
        }
    }

    /// Formats a recomputed cart.
    pub fn format_cart(&self, cart: &CartTotals) -> String {
        match self.format {
            OutputFormat::Json => to_json(cart, "{}"),
            OutputFormat::Table => self.table_cart(cart),
            OutputFormat::Markdown => self.markdown_cart(cart),
        }
    }

    /// Formats a visitor resolution.
    pub fn format_resolution(&self, resolution: &Resolution) -> String {
        match self.format {
            OutputFormat::Json => to_json(resolution, "{}"),
            OutputFormat::Table => self.table_resolution(resolution),
            OutputFormat::Markdown => self.markdown_resolution(resolution),
        }
    }

    /// Formats the country switcher list.
    pub fn format_countries(&self, entries: &[SwitcherEntry]) -> String {
        if entries.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                _ => "No countries configured.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => to_json(entries, "[]"),
            OutputFormat::Table => self.table_countries(entries),
            OutputFormat::Markdown => self.markdown_countries(entries),
        }
    }

    // Table formatting

    fn table_quote(&self, quote: &Quote) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Product:  {}", quote.product_id));
        lines.push(format!("Country:  {}", country_label(quote.country.as_ref())));

        let price = if quote.overridden {
            format!("{} {:.2} (base {:.2})", quote.currency, quote.price, quote.base_price)
        } else {
            format!("{} {:.2}", quote.currency, quote.price)
        };
        lines.push(format!("Price:    {}", price));

        lines.join("\n")
    }

    fn table_cart(&self, cart: &CartTotals) -> String {
        let product_width = 20;
        let qty_width = 5;
        let money_width = 12;

        let mut lines = Vec::new();

        lines.push(format!(
            "Country: {}  Currency: {}",
            country_label(cart.country.as_ref()),
            cart.currency
        ));
        lines.push(String::new());
        lines.push(format!(
            "{:<product_width$}  {:>qty_width$}  {:>money_width$}  {:>money_width$}  {:>money_width$}",
            "Product", "Qty", "Base", "Price", "Subtotal"
        ));
        lines.push(format!(
            "{:-<product_width$}  {:-<qty_width$}  {:-<money_width$}  {:-<money_width$}  {:-<money_width$}",
            "", "", "", "", ""
        ));

        for line in &cart.lines {
            lines.push(format!(
                "{:<product_width$}  {:>qty_width$}  {:>money_width$}  {:>money_width$}  {:>money_width$}",
                truncate(line.product_id.as_str(), product_width),
                line.quantity,
                format!("{:.2}", line.base_price),
                format!("{:.2}", line.price),
                format!("{:.2}", line.subtotal),
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} {:.2} ({} lines)", cart.currency, cart.total, cart.lines.len()));

        lines.join("\n")
    }

    fn table_resolution(&self, resolution: &Resolution) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Country:  {}", country_label(resolution.country.as_ref())));
        lines.push(format!("Currency: {}", resolution.currency));
        lines.push(format!("Shipping: {}", shipping_label(resolution)));

        if let Some(label) = &resolution.postcode_label {
            lines.push(format!("Postcode: {}", label));
        }
        if !resolution.css.is_empty() {
            lines.push(format!("Style:    {}", resolution.style_block));
        }
        if let Some(cookie) = &resolution.set_cookie {
            lines.push(format!("Cookie:   {}", cookie));
        }

        lines.join("\n")
    }

    fn table_countries(&self, entries: &[SwitcherEntry]) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{:<8} {:<10} {:<10} {:<12}", "Country", "Rate", "Currency", "Price field"));
        lines.push(format!("{:-<8} {:-<10} {:-<10} {:-<12}", "", "", "", ""));

        for entry in entries {
            lines.push(format!(
                "{:<8} {:<10} {:<10} {:<12}",
                entry.country.as_str(),
                entry.rate.to_string(),
                entry.currency.as_ref().map(|c| c.as_str()).unwrap_or("-"),
                entry.price_field
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} countries", entries.len()));

        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_quote(&self, quote: &Quote) -> String {
        let mut lines = Vec::new();

        lines.push(format!("## {}", quote.product_id));
        lines.push(String::new());
        lines.push(format!("- **Country:** {}", country_label(quote.country.as_ref())));
        lines.push(format!("- **Price:** {} {:.2}", quote.currency, quote.price));
        if quote.overridden {
            lines.push(format!("- **Base price:** {:.2}", quote.base_price));
        }

        lines.join("\n")
    }

    fn markdown_cart(&self, cart: &CartTotals) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "**Country:** {} | **Currency:** {}",
            country_label(cart.country.as_ref()),
            cart.currency
        ));
        lines.push(String::new());
        lines.push("| Product | Qty | Base | Price | Subtotal |".to_string());
        lines.push("|---------|-----|------|-------|----------|".to_string());

        for line in &cart.lines {
            lines.push(format!(
                "| {} | {} | {:.2} | {:.2} | {:.2} |",
                escape_markdown(line.product_id.as_str()),
                line.quantity,
                line.base_price,
                line.price,
                line.subtotal
            ));
        }

        lines.push(String::new());
        lines.push(format!("**Total:** {} {:.2}", cart.currency, cart.total));

        lines.join("\n")
    }

    fn markdown_resolution(&self, resolution: &Resolution) -> String {
        let mut lines = Vec::new();

        lines.push(format!("- **Country:** {}", country_label(resolution.country.as_ref())));
        lines.push(format!("- **Currency:** {}", resolution.currency));
        lines.push(format!("- **Shipping:** {}", shipping_label(resolution)));
        if let Some(label) = &resolution.postcode_label {
            lines.push(format!("- **Postcode label:** {}", label));
        }
        if !resolution.css.is_empty() {
            let fence = code_fence(&resolution.css);
            lines.push(String::new());
            lines.push(format!("{}css", fence));
            lines.push(resolution.css.clone());
            lines.push(fence);
        }

        lines.join("\n")
    }

    fn markdown_countries(&self, entries: &[SwitcherEntry]) -> String {
        let mut lines = Vec::new();

        lines.push("| Country | Rate | Currency | Price field |".to_string());
        lines.push("|---------|------|----------|-------------|".to_string());

        for entry in entries {
            lines.push(format!(
                "| {} | {} | {} | `{}` |",
                entry.country,
                entry.rate,
                entry.currency.as_ref().map(|c| c.as_str()).unwrap_or("-"),
                entry.price_field
            ));
        }

        lines.join("\n")
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T, empty: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| empty.to_string())
}

fn country_label(country: Option<&CountryCode>) -> &str {
    country.map(|c| c.as_str()).unwrap_or(UNRESOLVED)
}

fn shipping_label(resolution: &Resolution) -> String {
    match &resolution.shipping {
        Some(update) if update.recalculate_shipping => {
            format!("{} (recalculate)", update.shipping_country)
        }
        Some(update) => update.shipping_country.to_string(),
        None => "unchanged".to_string(),
    }
}

/// Backtick fence longer than any backtick run inside `text`.
fn code_fence(text: &str) -> String {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escapes pipe characters for markdown tables.
fn escape_markdown(s: &str) -> String {
    s.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{LineItem, ShippingUpdate};
    use crate::pricing::{CurrencyCode, ProductId};
    use rust_decimal::Decimal;

    fn code(s: &str) -> CountryCode {
        CountryCode::parse(s).unwrap()
    }

    fn sample_quote() -> Quote {
        Quote {
            product_id: ProductId::new("P"),
            country: Some(code("CA")),
            base_price: Decimal::new(8, 0),
            price: Decimal::new(130, 1),
            currency: CurrencyCode::parse("CAD").unwrap(),
            overridden: true,
        }
    }

    fn sample_cart() -> CartTotals {
        let mut line = LineItem::new("mug|large", 2, Decimal::new(650, 2));
        line.price = Decimal::new(4, 0);
        line.subtotal = Decimal::new(8, 0);
        CartTotals {
            country: Some(code("GB")),
            currency: CurrencyCode::parse("GBP").unwrap(),
            lines: vec![line],
            total: Decimal::new(8, 0),
        }
    }

    fn sample_resolution() -> Resolution {
        Resolution {
            country: Some(code("US")),
            currency: CurrencyCode::default(),
            css: ".a{}".to_string(),
            style_block: "<style type=\"text/css\">.a{}</style>".to_string(),
            shipping: Some(ShippingUpdate {
                billing_country: code("US"),
                shipping_country: code("US"),
                recalculate_shipping: true,
            }),
            postcode_label: Some("Zipcode".to_string()),
            set_cookie: None,
        }
    }

    #[test]
    fn test_json_quote() {
        let formatter = Formatter::new(OutputFormat::Json);
        let output = formatter.format_quote(&sample_quote());
        assert!(output.contains("\"product_id\": \"P\""));
        assert!(output.contains("\"currency\": \"CAD\""));
    }

    #[test]
    fn test_table_quote() {
        let formatter = Formatter::new(OutputFormat::Table);
        let output = formatter.format_quote(&sample_quote());
        assert!(output.contains("Country:  CA"));
        assert!(output.contains("Price:    CAD 13.00 (base 8.00)"));
    }

    #[test]
    fn test_markdown_quote() {
        let formatter = Formatter::new(OutputFormat::Markdown);
        let output = formatter.format_quote(&sample_quote());
        assert!(output.starts_with("## P"));
        assert!(output.contains("- **Base price:** 8.00"));
    }

    #[test]
    fn test_table_cart() {
        let formatter = Formatter::new(OutputFormat::Table);
        let output = formatter.format_cart(&sample_cart());
        assert!(output.contains("Product"));
        assert!(output.contains("Subtotal"));
        assert!(output.contains("6.50"));
        assert!(output.contains("Total: GBP 8.00 (1 lines)"));
    }

    #[test]
    fn test_markdown_cart_escapes_pipes() {
        let formatter = Formatter::new(OutputFormat::Markdown);
        let output = formatter.format_cart(&sample_cart());
        assert!(output.contains("| mug\\|large | 2 | 6.50 | 4.00 | 8.00 |"));
    }

    #[test]
    fn test_table_resolution() {
        let formatter = Formatter::new(OutputFormat::Table);
        let output = formatter.format_resolution(&sample_resolution());
        assert!(output.contains("Shipping: US (recalculate)"));
        assert!(output.contains("Postcode: Zipcode"));
        assert!(!output.contains("Cookie:"));
    }

    #[test]
    fn test_markdown_resolution_fences_css() {
        let mut resolution = sample_resolution();
        resolution.css = ".a::after { content: \"```\"; }".to_string();

        let output = Formatter::new(OutputFormat::Markdown).format_resolution(&resolution);
        assert!(output.contains("\n````css\n.a::after { content: \"```\"; }\n````"));
    }

    #[test]
    fn test_code_fence() {
        assert_eq!(code_fence(".a{}"), "```");
        assert_eq!(code_fence("a `b` c"), "```");
        assert_eq!(code_fence("a ```` b"), "`````");
    }

    #[test]
    fn test_countries_empty() {
        assert_eq!(Formatter::new(OutputFormat::Json).format_countries(&[]), "[]");
        assert_eq!(
            Formatter::new(OutputFormat::Table).format_countries(&[]),
            "No countries configured."
        );
    }

    #[test]
    fn test_table_countries() {
        let entries = vec![SwitcherEntry {
            country: code("CA"),
            rate: Decimal::new(13, 1),
            currency: None,
            price_field: "_price_CA".to_string(),
            price_label: "Price for CA".to_string(),
        }];
        let output = Formatter::new(OutputFormat::Table).format_countries(&entries);
        assert!(output.contains("CA       1.3        -          _price_CA"));
        assert!(output.contains("Total: 1 countries"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long product id", 10), "a very ...");
    }
}
