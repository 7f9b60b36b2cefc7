//! Error taxonomy for the scanning/resolution/conversion pipeline.
//!
//! Every variant is a recoverable-by-caller condition. Group-message
//! scanning maps any of them to "no reply"; the set command maps them to a
//! usage message; localization maps `PreferenceNotSet` to an onboarding
//! prompt. Nothing here should ever reach a caller as a panic.

use crate::preferences::UserId;
use crate::scanner::Meridiem;

/// Failure talking to one of the network collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Outcome channel for the slow resolution tier. "Token not found" is not an
/// error (that is `Ok(None)` from `resolve_full`); these variants mean the
/// tier itself could not be consulted, which a caller may want to retry.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no geocoding providers configured")]
    NoProviders,
    #[error("geocoding unavailable: {0}")]
    Unavailable(#[from] ProviderError),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no time expression found")]
    NoTimeExpression,
    #[error("timezone token {0:?} did not resolve")]
    UnresolvableTimezone(String),
    #[error("hour {hour} cannot carry a {meridiem} marker")]
    InvalidHourForMeridiem { hour: u32, meridiem: Meridiem },
    #[error("geocoding unavailable: {0}")]
    GeocodingUnavailable(#[from] ResolveError),
    #[error("malformed callback token {0:?}")]
    BadCallbackToken(String),
    #[error("user {0} has not set a timezone")]
    PreferenceNotSet(UserId),
    #[error("preference store failure: {0}")]
    Store(#[source] anyhow::Error),
}
