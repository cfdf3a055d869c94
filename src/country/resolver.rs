//! Visitor country resolution: explicit selection first, then geolocation.

use super::selection::{default_ttl, CountrySelection, VisitorContext};
use super::CountryCode;
use crate::config::Config;
use crate::geo::{GeoProvider, IpinfoClient};
use anyhow::Result;
use chrono::TimeDelta;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Determines a visitor's country.
///
/// Resolution never fails: every provider problem collapses to `None`,
/// which callers treat as "apply defaults".
pub struct CountryResolver {
    provider: Option<Box<dyn GeoProvider>>,
    timeout: Duration,
    selection_ttl: TimeDelta,
}

impl CountryResolver {
    /// Creates a resolver. `None` disables geolocation.
    pub fn new(provider: Option<Box<dyn GeoProvider>>) -> Self {
        Self { provider, timeout: DEFAULT_LOOKUP_TIMEOUT, selection_ttl: default_ttl() }
    }

    /// Builds a resolver backed by ipinfo.io when a token is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = IpinfoClient::from_config(config)?
            .map(|client| Box::new(client) as Box<dyn GeoProvider>);

        Ok(Self::new(provider)
            .with_timeout(config.geo_timeout())
            .with_selection_ttl(config.selection_ttl()))
    }

    /// Sets the upper bound on a provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long a geolocated country stays sticky.
    pub fn with_selection_ttl(mut self, ttl: TimeDelta) -> Self {
        self.selection_ttl = ttl;
        self
    }

    /// Returns the selection lifetime used for write-backs.
    pub fn selection_ttl(&self) -> TimeDelta {
        self.selection_ttl
    }

    /// Returns true when a geolocation provider is configured.
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Resolves the visitor's country, at most once per context.
    pub async fn resolve(&self, ctx: &mut VisitorContext) -> Option<CountryCode> {
        if let Some(cached) = ctx.cached_resolution() {
            return cached;
        }

        let country = self.resolve_uncached(ctx).await;
        ctx.cache_resolution(country.clone());
        country
    }

    async fn resolve_uncached(&self, ctx: &mut VisitorContext) -> Option<CountryCode> {
        if let Some(selection) = ctx.selection() {
            debug!("Using selected country {}", selection.country);
            return Some(selection.country.clone());
        }

        let Some(provider) = &self.provider else {
            debug!("No geolocation provider, country unresolved");
            return None;
        };

        let Some(addr) = ctx.remote_addr() else {
            debug!("No remote address, country unresolved");
            return None;
        };

        let country = self.lookup(provider.as_ref(), addr).await?;

        info!("Geolocated {} to {}", addr, country);
        ctx.remember(CountrySelection::new(country.clone(), self.selection_ttl));
        Some(country)
    }

    async fn lookup(&self, provider: &dyn GeoProvider, addr: IpAddr) -> Option<CountryCode> {
        match tokio::time::timeout(self.timeout, provider.lookup_country(addr)).await {
            Ok(Ok(body)) => match CountryCode::parse(&body) {
                Ok(country) => Some(country),
                Err(e) => {
                    warn!("Geolocation returned an unusable body for {}: {}", addr, e);
                    None
                }
            },
            Ok(Err(e)) => {
                warn!("Geolocation lookup failed for {}: {:#}", addr, e);
                None
            }
            Err(_) => {
                warn!("Geolocation lookup for {} timed out after {:?}", addr, self.timeout);
                None
            }
        }
    }
}
