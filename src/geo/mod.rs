//! IP geolocation providers.

pub mod client;

pub use client::{GeoProvider, IpinfoClient};
