//! HTTP implementations of the two network collaborators: a Nominatim
//! search client for forward geocoding and a GeoNames `timezoneJSON` client
//! for point-to-timezone lookup.
//!
//! Both carry a bounded request timeout so the slow resolution tier can
//! never hang a caller; timeouts and transport failures surface as
//! `ProviderError::Http`, which the resolver reports as the tier being
//! unavailable rather than "not found".

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use lru::LruCache;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::ProviderError;
use crate::resolver::{GeoPoint, GeoTimezoneProvider, GeocodeProvider};

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_GEONAMES_URL: &str = "http://api.geonames.org/timezoneJSON";
pub const DEFAULT_USER_AGENT: &str = "localzone/0.1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Duplicate concurrent lookups for the same token are acceptable, so a
/// plain process-wide LRU of past answers is enough.
static GEOCODE_CACHE: Lazy<Mutex<LruCache<String, Option<GeoPoint>>>> =
    Lazy::new(|| Mutex::new(LruCache::new(NonZeroUsize::new(100).unwrap())));

fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder().user_agent(user_agent.to_string()).timeout(timeout).build()?)
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self { client: build_client(user_agent, timeout)?, base_url: base_url.to_string() })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, ProviderError> {
        if let Some(hit) = GEOCODE_CACHE.lock().unwrap().get(query) {
            debug!("geocode cache hit for {:?}", query);
            return Ok(*hit);
        }

        let url = Url::parse_with_params(
            &self.base_url,
            &[("q", query), ("format", "json"), ("limit", "1")],
        )
        .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Unexpected(format!(
                "geocoder returned {}: {}",
                status, body
            )));
        }

        let rows: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Unexpected(format!("bad geocoder payload: {}", e)))?;

        // Nominatim returns coordinates as strings in the first result row
        let point = rows.get(0).and_then(|row| {
            let lat = row.get("lat")?.as_str()?.parse::<f64>().ok()?;
            let lng = row.get("lon")?.as_str()?.parse::<f64>().ok()?;
            Some(GeoPoint { lat, lng })
        });

        debug!("geocoded {:?} -> {:?}", query, point);
        GEOCODE_CACHE.lock().unwrap().put(query.to_string(), point);
        Ok(point)
    }
}

pub struct GeoNamesTimezoneLookup {
    client: Client,
    base_url: String,
    username: String,
}

impl GeoNamesTimezoneLookup {
    pub fn new(
        base_url: &str,
        username: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(user_agent, timeout)?,
            base_url: base_url.to_string(),
            username: username.to_string(),
        })
    }
}

#[async_trait]
impl GeoTimezoneProvider for GeoNamesTimezoneLookup {
    async fn timezone_for_point(&self, point: GeoPoint) -> Result<Option<String>, ProviderError> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("lat", point.lat.to_string()),
                ("lng", point.lng.to_string()),
                ("username", self.username.clone()),
            ],
        )
        .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Unexpected(format!(
                "timezone lookup returned {}: {}",
                status, body
            )));
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Unexpected(format!("bad lookup payload: {}", e)))?;

        if let Some(name) = payload.get("timezoneId").and_then(Value::as_str) {
            debug!("point ({}, {}) -> {}", point.lat, point.lng, name);
            return Ok(Some(name.to_string()));
        }

        // GeoNames reports auth/quota problems as a status object; a payload
        // with neither field means the point maps to no zone
        if let Some(message) =
            payload.get("status").and_then(|s| s.get("message")).and_then(Value::as_str)
        {
            return Err(ProviderError::Unexpected(message.to_string()));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clients_build_with_defaults() {
        assert!(NominatimGeocoder::new(
            DEFAULT_NOMINATIM_URL,
            DEFAULT_USER_AGENT,
            DEFAULT_TIMEOUT
        )
        .is_ok());
        assert!(GeoNamesTimezoneLookup::new(
            DEFAULT_GEONAMES_URL,
            "demo",
            DEFAULT_USER_AGENT,
            DEFAULT_TIMEOUT
        )
        .is_ok());
    }

    #[test]
    fn query_urls_are_well_formed() {
        let url = Url::parse_with_params(
            DEFAULT_NOMINATIM_URL,
            &[("q", "tel aviv"), ("format", "json"), ("limit", "1")],
        )
        .unwrap();
        assert_eq!(url.query(), Some("q=tel+aviv&format=json&limit=1"));
    }
}
