//! country-pricing - Per-country storefront pricing CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use country_pricing::commands::{CartCommand, QuoteCommand, ResolveCommand};
use country_pricing::config::{Config, OutputFormat};
use country_pricing::country::{CountryCode, CountrySelection, VisitorContext};
use country_pricing::engine::PricingEngine;
use country_pricing::format::Formatter;
use country_pricing::pricing::{CatalogItem, Money};
use country_pricing::session::SessionFile;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "country-pricing",
    version,
    about = "Per-country prices, currency and styling for a storefront",
    long_about = "Resolves a visitor's country from a sticky selection or IP geolocation and applies per-country prices, currency labels, CSS and shipping destination."
)]
struct Cli {
    /// Visitor IP address used for geolocation
    #[arg(long, global = true)]
    ip: Option<IpAddr>,

    /// Treat the visitor as having selected this country
    #[arg(long, global = true)]
    country: Option<String>,

    /// Raw Cookie header sent by the visitor
    #[arg(long, global = true)]
    cookie: Option<String>,

    /// File persisting the visitor's country selection between runs
    #[arg(long, global = true, env = "COUNTRY_PRICING_SESSION")]
    session: Option<PathBuf>,

    /// ipinfo.io API token
    #[arg(long, global = true, env = "COUNTRY_PRICING_IPINFO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Proxy URL for geolocation requests (e.g., socks5://host:port)
    #[arg(long, global = true, env = "COUNTRY_PRICING_PROXY")]
    proxy: Option<String>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the price of one product for the visitor
    #[command(alias = "p")]
    Price {
        /// Product id, matching a `[products.<id>]` config table
        product_id: String,

        /// Catalog price before country adjustment
        base_price: Money,
    },

    /// Recompute a cart from a JSON file of line items
    Cart {
        /// JSON array of `{"product_id", "quantity", "base_price"}`
        file: PathBuf,
    },

    /// Show the visitor's country, currency, CSS and shipping destination
    #[command(alias = "r")]
    Resolve,

    /// Record an explicit country selection
    Select {
        /// Two-letter country code
        country: String,
    },

    /// Forget the persisted country selection
    Forget,

    /// List countries offered by the country switcher
    Countries,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(token) = cli.token {
        config.ipinfo_token = Some(token);
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }

    let engine = PricingEngine::from_config(&config)?;
    let session = cli.session.map(SessionFile::new);

    let mut ctx = match &cli.cookie {
        Some(header) => {
            VisitorContext::from_cookie_header(Some(header), cli.ip, config.selection_ttl())
        }
        None => VisitorContext::new(cli.ip),
    };

    if let Some(raw) = &cli.country {
        let country = CountryCode::parse(raw)?;
        ctx = ctx.with_selection(CountrySelection::new(country, config.selection_ttl()));
    } else if ctx.selection().is_none() {
        if let Some(selection) = session.as_ref().map(SessionFile::load).transpose()?.flatten() {
            ctx = ctx.with_selection(selection);
        }
    }

    match cli.command {
        Commands::Price { product_id, base_price } => {
            let cmd = QuoteCommand::new(&engine, config.format);
            let item = CatalogItem::new(product_id, base_price);
            println!("{}", cmd.execute(&item, &mut ctx).await);
        }

        Commands::Cart { file } => {
            let cmd = CartCommand::new(&engine, config.format);
            println!("{}", cmd.execute(&file, &mut ctx).await?);
        }

        Commands::Resolve => {
            let cmd = ResolveCommand::new(&engine, config.format);
            println!("{}", cmd.execute(&mut ctx).await);
        }

        Commands::Select { country } => {
            let country = engine.select_country(&mut ctx, &country)?;
            println!("Selected {}", country);
            if let Some(selection) = ctx.selection_update() {
                println!("Set-Cookie: {}", selection.cookie_header());
            }
        }

        Commands::Forget => {
            let file = session.as_ref().context("--session is required to forget a selection")?;
            file.clear()?;
            println!("Cleared selection in {}", file.path().display());
        }

        Commands::Countries => {
            let formatter = Formatter::new(config.format);
            println!("{}", formatter.format_countries(&engine.switcher_countries()));
        }
    }

    // Persist a fresh selection or geolocation result
    if let (Some(session), Some(selection)) = (&session, ctx.take_selection_update()) {
        session.save(&selection)?;
    }

    Ok(())
}
