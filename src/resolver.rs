//! Tiered timezone resolution: alias table, IANA identifier lookup, then a
//! geocoding fallback.
//!
//! The fast tier never touches the network and is the only tier allowed
//! while scanning group messages. The full tier issues exactly one geocoding
//! request and one point lookup, and only runs for explicit set-timezone
//! commands. Providers are injected by the caller; the resolver holds no
//! global state.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use log::{debug, warn};

use crate::aliases::AliasTable;
use crate::error::{ProviderError, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Forward geocoding: free text to a point, or `None` when the text names no
/// known place.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, ProviderError>;
}

/// Geographic timezone boundaries: point to IANA name, or `None` when the
/// point lies in no zone (open ocean).
#[async_trait]
pub trait GeoTimezoneProvider: Send + Sync {
    async fn timezone_for_point(&self, point: GeoPoint) -> Result<Option<String>, ProviderError>;
}

pub struct TimezoneResolver {
    aliases: AliasTable,
    providers: Option<(Arc<dyn GeocodeProvider>, Arc<dyn GeoTimezoneProvider>)>,
}

impl TimezoneResolver {
    /// Fast tiers only; `resolve_full` will report the geocoding tier as
    /// unavailable.
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases, providers: None }
    }

    pub fn with_providers(
        aliases: AliasTable,
        geocoder: Arc<dyn GeocodeProvider>,
        geo_timezones: Arc<dyn GeoTimezoneProvider>,
    ) -> Self {
        Self { aliases, providers: Some((geocoder, geo_timezones)) }
    }

    /// Alias table, then the IANA database probed as-is, lowercase,
    /// uppercase and title case. No I/O.
    pub fn resolve_fast(&self, token: &str) -> Option<Tz> {
        if let Some(tz) = self.aliases.lookup(token) {
            debug!("alias tier resolved {:?} -> {}", token, tz.name());
            return Some(tz);
        }

        let title = title_case_identifier(token);
        let candidates = [token, &token.to_lowercase(), &token.to_uppercase(), &title];
        for candidate in candidates {
            if let Ok(tz) = Tz::from_str(candidate) {
                debug!("named tier resolved {:?} -> {}", token, tz.name());
                return Some(tz);
            }
        }
        None
    }

    /// Fast tiers plus the geocoding fallback. `Ok(None)` means every tier
    /// was exhausted; `Err` means a provider could not be consulted.
    pub async fn resolve_full(&self, token: &str) -> Result<Option<Tz>, ResolveError> {
        if let Some(tz) = self.resolve_fast(token) {
            return Ok(Some(tz));
        }

        let (geocoder, geo_timezones) =
            self.providers.as_ref().ok_or(ResolveError::NoProviders)?;

        let point = match geocoder.geocode(token).await? {
            Some(point) => point,
            None => {
                debug!("geocoder found no location for {:?}", token);
                return Ok(None);
            }
        };

        let name = match geo_timezones.timezone_for_point(point).await? {
            Some(name) => name,
            None => {
                debug!("no timezone at ({}, {})", point.lat, point.lng);
                return Ok(None);
            }
        };

        match Tz::from_str(&name) {
            Ok(tz) => {
                debug!("geographic tier resolved {:?} -> {}", token, tz.name());
                Ok(Some(tz))
            }
            Err(_) => {
                warn!("geographic lookup returned unknown zone {:?}", name);
                Ok(None)
            }
        }
    }
}

/// Capitalizes each alphabetic run, so `europe/berlin` probes as
/// `Europe/Berlin` and `america/new_york` as `America/New_York`.
fn title_case_identifier(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut word_start = true;
    for c in token.chars() {
        if c.is_ascii_alphabetic() {
            if word_start {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c.to_ascii_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    struct StubGeocoder(Result<Option<GeoPoint>, &'static str>);

    #[async_trait]
    impl GeocodeProvider for StubGeocoder {
        async fn geocode(&self, _query: &str) -> Result<Option<GeoPoint>, ProviderError> {
            self.0.clone().map_err(|m| ProviderError::Unexpected(m.to_string()))
        }
    }

    struct StubGeoTz(Result<Option<&'static str>, &'static str>);

    #[async_trait]
    impl GeoTimezoneProvider for StubGeoTz {
        async fn timezone_for_point(
            &self,
            _point: GeoPoint,
        ) -> Result<Option<String>, ProviderError> {
            self.0
                .clone()
                .map(|name| name.map(str::to_string))
                .map_err(|m| ProviderError::Unexpected(m.to_string()))
        }
    }

    fn fast_resolver() -> TimezoneResolver {
        TimezoneResolver::new(AliasTable::new())
    }

    fn full_resolver(
        geocode: Result<Option<GeoPoint>, &'static str>,
        tz: Result<Option<&'static str>, &'static str>,
    ) -> TimezoneResolver {
        TimezoneResolver::with_providers(
            AliasTable::new(),
            Arc::new(StubGeocoder(geocode)),
            Arc::new(StubGeoTz(tz)),
        )
    }

    #[test_case("GMT"; "upper")]
    #[test_case("gmt"; "lower")]
    #[test_case("Gmt"; "title")]
    fn gmt_resolves_to_canonical_utc_in_any_case(token: &str) {
        assert_eq!(fast_resolver().resolve_fast(token), Some(Tz::UTC));
    }

    #[test_case("Europe/Berlin" => Some(Tz::Europe__Berlin); "exact identifier")]
    #[test_case("europe/berlin" => Some(Tz::Europe__Berlin); "lowercase identifier")]
    #[test_case("america/new_york" => Some(Tz::America__New_York); "underscore segment")]
    #[test_case("israel" => Some(Tz::Israel); "bare name via title case")]
    #[test_case("UTC" => Some(Tz::UTC))]
    #[test_case("berlin" => Some(Tz::Europe__Berlin); "city alias")]
    #[test_case("notaplace" => None)]
    fn fast_tier(token: &str) -> Option<Tz> {
        fast_resolver().resolve_fast(token)
    }

    #[test]
    fn fast_tier_never_reaches_providers() {
        // providers that would fail loudly if consulted
        let resolver = full_resolver(Err("must not be called"), Err("must not be called"));
        assert_eq!(resolver.resolve_fast("berlin"), Some(Tz::Europe__Berlin));
    }

    #[tokio::test]
    async fn full_tier_short_circuits_on_fast_hit() {
        let resolver = full_resolver(Err("down"), Err("down"));
        let resolved = resolver.resolve_full("moscow").await.unwrap();
        assert_eq!(resolved, Some(Tz::Europe__Moscow));
    }

    #[tokio::test]
    async fn full_tier_resolves_through_geocoding() {
        let resolver = full_resolver(
            Ok(Some(GeoPoint { lat: 52.52, lng: 13.4 })),
            Ok(Some("Europe/Berlin")),
        );
        let resolved = resolver.resolve_full("kreuzberg").await.unwrap();
        assert_eq!(resolved, Some(Tz::Europe__Berlin));
    }

    #[tokio::test]
    async fn unknown_place_is_not_found_rather_than_error() {
        let resolver = full_resolver(Ok(None), Err("must not be called"));
        assert_eq!(resolver.resolve_full("xyzzy").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zoneless_point_is_not_found() {
        let resolver =
            full_resolver(Ok(Some(GeoPoint { lat: 0.0, lng: -140.0 })), Ok(None));
        assert_eq!(resolver.resolve_full("somewhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn provider_failure_is_distinguishable_from_not_found() {
        let resolver = full_resolver(Err("connection refused"), Err("unused"));
        let err = resolver.resolve_full("berlinn").await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable(_)));
    }

    #[tokio::test]
    async fn missing_providers_surface_as_unavailable_tier() {
        let err = fast_resolver().resolve_full("kreuzberg").await.unwrap_err();
        assert!(matches!(err, ResolveError::NoProviders));
    }

    #[tokio::test]
    async fn bogus_zone_name_from_provider_is_not_found() {
        let resolver = full_resolver(
            Ok(Some(GeoPoint { lat: 1.0, lng: 1.0 })),
            Ok(Some("Mars/Olympus_Mons")),
        );
        assert_eq!(resolver.resolve_full("olympus").await.unwrap(), None);
    }
}
