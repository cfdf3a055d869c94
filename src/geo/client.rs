//! HTTP client for the ipinfo.io country endpoint.

use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;
use wreq::Client;

const IPINFO_BASE: &str = "https://ipinfo.io";

/// Trait for IP-to-country lookups - enables mocking for tests.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Returns the raw country string the provider reports for `addr`.
    async fn lookup_country(&self, addr: IpAddr) -> Result<String>;
}

/// ipinfo.io client authenticated with an API token.
pub struct IpinfoClient {
    client: Client,
    token: String,
    base_url: String,
}

impl IpinfoClient {
    /// Creates a client from configuration.
    ///
    /// Returns `Ok(None)` when no token is configured, which disables
    /// geolocation entirely.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(token) = config.ipinfo_token() else {
            debug!("No ipinfo token configured, geolocation disabled");
            return Ok(None);
        };

        let mut builder = Client::builder()
            .timeout(config.geo_timeout())
            .connect_timeout(config.geo_timeout().min(Duration::from_secs(10)));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to create HTTP client")?;
        Ok(Some(Self { client, token: token.to_string(), base_url: config.geo_base_url.clone() }))
    }

    /// Creates a client against a custom base URL (for testing).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { client, token: token.into(), base_url: base_url.into() })
    }

    /// Creates a client against ipinfo.io.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, IPINFO_BASE)
    }

    fn country_url(&self, addr: IpAddr) -> String {
        format!(
            "{}/{}/country?token={}",
            self.base_url.trim_end_matches('/'),
            addr,
            urlencoding::encode(&self.token)
        )
    }
}

#[async_trait]
impl GeoProvider for IpinfoClient {
    async fn lookup_country(&self, addr: IpAddr) -> Result<String> {
        let url = self.country_url(addr);
        debug!("GET {}/{}/country", self.base_url, addr);

        let response = self
            .client
            .get(&url)
            .header("Accept", "text/plain")
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            anyhow::bail!("ipinfo returned status: {}", status);
        }

        response.text().await.context("Failed to read response body")
    }
}
