//! Sticky country selection and the per-request visitor context.

use super::CountryCode;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::debug;

/// Name of the client-side cookie carrying the selection.
pub const COOKIE_NAME: &str = "selected_country";

/// How long a selection stays sticky unless configured otherwise.
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// Returns the default selection lifetime.
pub fn default_ttl() -> TimeDelta {
    TimeDelta::days(DEFAULT_TTL_DAYS)
}

/// A country choice remembered client-side until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountrySelection {
    pub country: CountryCode,
    pub selected_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CountrySelection {
    /// Creates a selection starting now.
    pub fn new(country: CountryCode, ttl: TimeDelta) -> Self {
        Self::starting_at(country, Utc::now(), ttl)
    }

    /// Creates a selection starting at the given instant.
    pub fn starting_at(country: CountryCode, at: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self { country, selected_at: at, expires_at: at + ttl }
    }

    /// Returns true while the selection has not expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Returns true if the selection is still valid right now.
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Lifetime of the selection in seconds.
    pub fn max_age_secs(&self) -> i64 {
        (self.expires_at - self.selected_at).num_seconds().max(0)
    }

    /// Renders the `Set-Cookie` value that persists this selection.
    pub fn cookie_header(&self) -> String {
        format!("{}={}; Max-Age={}; Path=/", COOKIE_NAME, self.country, self.max_age_secs())
    }
}

/// Request-scoped state for one visitor.
///
/// Holds the explicit selection read from the client, the network address
/// used for geolocation, a cache slot so a request resolves at most once, and
/// the selection (if any) that must be written back to the client.
#[derive(Debug, Clone, Default)]
pub struct VisitorContext {
    selection: Option<CountrySelection>,
    remote_addr: Option<IpAddr>,
    resolved: Option<Option<CountryCode>>,
    selection_update: Option<CountrySelection>,
}

impl VisitorContext {
    /// Creates a context with no prior selection.
    pub fn new(remote_addr: Option<IpAddr>) -> Self {
        Self { remote_addr, ..Self::default() }
    }

    /// Attaches a previously persisted selection.
    pub fn with_selection(mut self, selection: CountrySelection) -> Self {
        self.selection = Some(selection);
        self.resolved = None;
        self
    }

    /// Builds a context from a raw `Cookie` request header.
    ///
    /// The browser enforces the cookie's expiry, so a present value is
    /// treated as an active selection. Invalid values are ignored.
    pub fn from_cookie_header(
        header: Option<&str>,
        remote_addr: Option<IpAddr>,
        ttl: TimeDelta,
    ) -> Self {
        let ctx = Self::new(remote_addr);
        let Some(value) = header.and_then(cookie_value) else {
            return ctx;
        };

        match CountryCode::parse(value) {
            Ok(country) => ctx.with_selection(CountrySelection::new(country, ttl)),
            Err(e) => {
                debug!("Ignoring {} cookie: {}", COOKIE_NAME, e);
                ctx
            }
        }
    }

    /// Records an explicit choice made by the visitor.
    pub fn select(&mut self, country: CountryCode, ttl: TimeDelta) {
        self.remember(CountrySelection::new(country, ttl));
    }

    /// Returns the active explicit selection, ignoring an expired one.
    pub fn selection(&self) -> Option<&CountrySelection> {
        self.selection.as_ref().filter(|s| s.is_active())
    }

    /// Returns the visitor's network address.
    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    /// Returns the selection that should be persisted client-side, if any.
    pub fn selection_update(&self) -> Option<&CountrySelection> {
        self.selection_update.as_ref()
    }

    /// Takes the pending selection write-back.
    pub fn take_selection_update(&mut self) -> Option<CountrySelection> {
        self.selection_update.take()
    }

    /// Stores a selection and queues it for write-back.
    pub(crate) fn remember(&mut self, selection: CountrySelection) {
        self.selection = Some(selection.clone());
        self.selection_update = Some(selection);
        self.resolved = None;
    }

    pub(crate) fn cached_resolution(&self) -> Option<Option<CountryCode>> {
        self.resolved.clone()
    }

    pub(crate) fn cache_resolution(&mut self, country: Option<CountryCode>) {
        self.resolved = Some(country);
    }
}

/// Finds the selection cookie in a `Cookie` header.
fn cookie_value(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name.trim() == COOKIE_NAME).then_some(value.trim())
    })
}
