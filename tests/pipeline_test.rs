//! End-to-end flows over the full pipeline: group-message scanning,
//! set-timezone commands with stubbed network providers, and callback
//! localization against the preference store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use pretty_assertions::assert_eq;

use localzone::pipeline::{announcement_text, localized_text};
use localzone::{
    AliasTable, CallbackToken, GeoPoint, GeoTimezoneProvider, GeocodeProvider,
    MemoryPreferenceStore, Pipeline, PipelineError, ProviderError, TimeScanner, TimezoneResolver,
};

// midwinter, so Berlin is UTC+1 and Moscow UTC+3
fn winter() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

struct StubGeocoder(Option<GeoPoint>);

#[async_trait]
impl GeocodeProvider for StubGeocoder {
    async fn geocode(&self, _query: &str) -> Result<Option<GeoPoint>, ProviderError> {
        Ok(self.0)
    }
}

struct FailingGeocoder;

#[async_trait]
impl GeocodeProvider for FailingGeocoder {
    async fn geocode(&self, _query: &str) -> Result<Option<GeoPoint>, ProviderError> {
        Err(ProviderError::Unexpected("connection refused".to_string()))
    }
}

struct StubGeoTz(Option<&'static str>);

#[async_trait]
impl GeoTimezoneProvider for StubGeoTz {
    async fn timezone_for_point(
        &self,
        _point: GeoPoint,
    ) -> Result<Option<String>, ProviderError> {
        Ok(self.0.map(str::to_string))
    }
}

fn fast_pipeline() -> Pipeline {
    Pipeline::new(
        TimeScanner::new(),
        TimezoneResolver::new(AliasTable::new()),
        Arc::new(MemoryPreferenceStore::new()),
    )
}

fn geocoding_pipeline(
    geocoder: impl GeocodeProvider + 'static,
    geo_tz: impl GeoTimezoneProvider + 'static,
) -> Pipeline {
    Pipeline::new(
        TimeScanner::new(),
        TimezoneResolver::with_providers(
            AliasTable::new(),
            Arc::new(geocoder),
            Arc::new(geo_tz),
        ),
        Arc::new(MemoryPreferenceStore::new()),
    )
}

#[test]
fn nine_pm_berlin_end_to_end() {
    let pipeline = fast_pipeline();
    let instant = pipeline
        .scan_message_at("Let's meet at 9pm berlin tomorrow", winter())
        .unwrap();

    assert_eq!(instant.timezone, Tz::Europe__Berlin);
    assert_eq!(instant.local, hm(21, 0));
    assert_eq!(instant.utc, hm(20, 0));
    assert_eq!(announcement_text(&instant), "21:00 Europe/Berlin");
    assert_eq!(instant.callback_token().to_string(), "20:00");
}

#[test]
fn message_without_time_yields_no_reply() {
    let err = fast_pipeline().scan_message_at("see you soon!", winter()).unwrap_err();
    assert!(matches!(err, PipelineError::NoTimeExpression));
}

#[test]
fn numeric_id_yields_no_reply() {
    let err = fast_pipeline().scan_message_at("room 234", winter()).unwrap_err();
    assert!(matches!(err, PipelineError::NoTimeExpression));
}

#[test]
fn unresolvable_token_yields_no_reply() {
    let err = fast_pipeline().scan_message_at("dinner at 8pm tonight", winter()).unwrap_err();
    assert!(matches!(err, PipelineError::UnresolvableTimezone(_)));
}

#[test]
fn first_resolvable_candidate_wins() {
    // "qwzxy" fails the fast tiers, so the later moscow candidate is used
    let instant = fast_pipeline()
        .scan_message_at("9pm qwzxy or maybe 11:15 moscow", winter())
        .unwrap();
    assert_eq!(instant.timezone, Tz::Europe__Moscow);
    assert_eq!(instant.local, hm(11, 15));

    // when both resolve, the earlier one wins even though the later would too
    let instant = fast_pipeline()
        .scan_message_at("9pm berlin or 10pm moscow", winter())
        .unwrap();
    assert_eq!(instant.timezone, Tz::Europe__Berlin);
}

#[test]
fn meridiem_on_24_hour_time_aborts_the_message() {
    let err = fast_pipeline().scan_message_at("13pm moscow", winter()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidHourForMeridiem { hour: 13, .. }));
}

#[tokio::test]
async fn set_command_with_named_timezone() {
    let pipeline = fast_pipeline();
    let tz = pipeline.set_timezone(1, "Europe/Berlin").await.unwrap();
    assert_eq!(tz, Tz::Europe__Berlin);

    // case-insensitive named lookup
    let tz = pipeline.set_timezone(1, "israel").await.unwrap();
    assert_eq!(tz, Tz::Israel);
}

#[tokio::test]
async fn set_command_falls_back_to_geocoding() {
    let pipeline = geocoding_pipeline(
        StubGeocoder(Some(GeoPoint { lat: 48.2, lng: 16.37 })),
        StubGeoTz(Some("Europe/Vienna")),
    );
    let tz = pipeline.set_timezone(1, "stephansplatz").await.unwrap();
    assert_eq!(tz, Tz::Europe__Vienna);
}

#[tokio::test]
async fn set_command_reports_usage_material_errors() {
    let pipeline = geocoding_pipeline(StubGeocoder(None), StubGeoTz(None));

    let err = pipeline.set_timezone(1, "").await.unwrap_err();
    assert!(matches!(err, PipelineError::UnresolvableTimezone(_)));

    let err = pipeline.set_timezone(1, "nowhere at all").await.unwrap_err();
    assert!(matches!(err, PipelineError::UnresolvableTimezone(_)));
}

#[tokio::test]
async fn set_command_distinguishes_provider_outage() {
    let pipeline = geocoding_pipeline(FailingGeocoder, StubGeoTz(None));
    let err = pipeline.set_timezone(1, "somewhere").await.unwrap_err();
    assert!(matches!(err, PipelineError::GeocodingUnavailable(_)));
}

#[tokio::test]
async fn localize_without_preference_prompts_onboarding() {
    let pipeline = fast_pipeline();
    let token: CallbackToken = "20:00".parse().unwrap();

    let err = pipeline.localize_at(&token, 42, winter()).await.unwrap_err();
    assert!(matches!(err, PipelineError::PreferenceNotSet(42)));
}

#[tokio::test]
async fn posted_instant_localizes_into_viewer_timezone() {
    let pipeline = fast_pipeline();

    // author posts "9pm berlin" -> 20:00 UTC
    let instant = pipeline
        .scan_message_at("Let's meet at 9pm berlin", winter())
        .unwrap();
    let token = instant.callback_token();

    // the token round-trips through the chat platform as text
    let replayed: CallbackToken = token.to_string().parse().unwrap();

    // a viewer in Moscow localizes it
    pipeline.set_timezone(7, "moscow").await.unwrap();
    let localized = pipeline.localize_at(&replayed, 7, winter()).await.unwrap();

    assert_eq!(localized.timezone, Tz::Europe__Moscow);
    assert_eq!(localized.local, hm(23, 0));
    assert_eq!(
        localized_text(&replayed, &localized),
        "20:00 UTC, which is 23:00 in Europe/Moscow"
    );
}

#[tokio::test]
async fn repeated_localization_is_idempotent_until_preference_changes() {
    let pipeline = fast_pipeline();
    let token: CallbackToken = "20:00".parse().unwrap();

    pipeline.set_timezone(7, "berlin").await.unwrap();
    let first = pipeline.localize_at(&token, 7, winter()).await.unwrap();
    let second = pipeline.localize_at(&token, 7, winter()).await.unwrap();
    assert_eq!(first, second);

    pipeline.set_timezone(7, "moscow").await.unwrap();
    let third = pipeline.localize_at(&token, 7, winter()).await.unwrap();
    assert_eq!(third.local, hm(23, 0));
}
