//! The three message-facing operations, wired over scanner, resolver,
//! converter and preference store:
//!
//! - scan a group message and produce the UTC instant to announce,
//! - handle an explicit set-timezone command (the only network path),
//! - localize a replayed callback token into a viewer's saved timezone.
//!
//! Every failure is an explicit `PipelineError`; how to reply (silence,
//! usage text, onboarding prompt) is the chat collaborator's decision.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use log::{debug, warn};

use crate::convert::{self, CallbackToken, ResolvedInstant};
use crate::error::PipelineError;
use crate::preferences::{PreferenceStore, UserId};
use crate::resolver::TimezoneResolver;
use crate::scanner::{TimeExpression, TimeScanner};

/// A UTC instant re-localized into a viewer's saved timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedTime {
    pub local: NaiveTime,
    pub timezone: Tz,
}

pub struct Pipeline {
    scanner: TimeScanner,
    resolver: TimezoneResolver,
    store: Arc<dyn PreferenceStore>,
}

impl Pipeline {
    pub fn new(
        scanner: TimeScanner,
        resolver: TimezoneResolver,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self { scanner, resolver, store }
    }

    /// First candidate whose token resolves through the fast tiers, in text
    /// order. Later candidates are never consulted after a hit, and the
    /// slow geocoding tier is never consulted at all.
    pub fn first_resolvable<'a>(
        &self,
        candidates: &'a [TimeExpression],
    ) -> Option<(&'a TimeExpression, Tz)> {
        candidates.iter().find_map(|expr| {
            match self.resolver.resolve_fast(&expr.timezone_token) {
                Some(tz) => Some((expr, tz)),
                None => {
                    debug!("skipping candidate with unresolved token {:?}", expr.timezone_token);
                    None
                }
            }
        })
    }

    /// Group-message path: scan, pick the first resolvable candidate,
    /// convert to UTC on today's date. Any error means "send no reply".
    pub fn scan_message(&self, text: &str) -> Result<ResolvedInstant, PipelineError> {
        self.scan_message_at(text, Utc::now())
    }

    pub fn scan_message_at(
        &self,
        text: &str,
        reference: DateTime<Utc>,
    ) -> Result<ResolvedInstant, PipelineError> {
        let candidates = self.scanner.scan(text);
        if candidates.is_empty() {
            return Err(PipelineError::NoTimeExpression);
        }

        let (expr, tz) = self.first_resolvable(&candidates).ok_or_else(|| {
            PipelineError::UnresolvableTimezone(candidates[0].timezone_token.clone())
        })?;

        convert::to_utc(expr, tz, reference)
    }

    /// Set-command path: full resolution (geocoding fallback allowed), then
    /// persist the canonical name. Any error maps to the usage reply.
    pub async fn set_timezone(&self, user_id: UserId, query: &str) -> Result<Tz, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::UnresolvableTimezone(String::new()));
        }

        let tz = self
            .resolver
            .resolve_full(query)
            .await?
            .ok_or_else(|| PipelineError::UnresolvableTimezone(query.to_string()))?;

        self.store.set(user_id, tz.name()).await.map_err(PipelineError::Store)?;
        debug!("user {} timezone set to {}", user_id, tz.name());
        Ok(tz)
    }

    /// Callback path: replay a stored UTC instant into the viewer's saved
    /// timezone, evaluated at today's date.
    pub async fn localize(
        &self,
        token: &CallbackToken,
        user_id: UserId,
    ) -> Result<LocalizedTime, PipelineError> {
        self.localize_at(token, user_id, Utc::now()).await
    }

    pub async fn localize_at(
        &self,
        token: &CallbackToken,
        user_id: UserId,
        reference: DateTime<Utc>,
    ) -> Result<LocalizedTime, PipelineError> {
        let name = self
            .store
            .get(user_id)
            .await
            .map_err(PipelineError::Store)?
            .ok_or(PipelineError::PreferenceNotSet(user_id))?;

        let tz = match Tz::from_str(&name) {
            Ok(tz) => tz,
            Err(_) => {
                // a stored name the database no longer knows; re-onboard
                warn!("user {} has unparseable saved timezone {:?}", user_id, name);
                return Err(PipelineError::PreferenceNotSet(user_id));
            }
        };

        Ok(LocalizedTime { local: convert::to_local(token.time(), tz, reference), timezone: tz })
    }
}

// Reply strings the chat collaborator sends verbatim.

pub const SET_USAGE: &str = "Please use this format /set timezone\n\
for example: /set Europe/Berlin, /set Israel";

pub const ONBOARDING: &str = "Please set your timezone.\n\
with the command /set timezone\n\
for example: /set Europe/Berlin, /set Israel\n\
then, go back to where you came from and click the button again";

/// Text announced under the original message: "21:00 Europe/Berlin".
pub fn announcement_text(instant: &ResolvedInstant) -> String {
    format!("{} {}", instant.local.format("%H:%M"), instant.timezone.name())
}

/// Text shown to a viewer who pressed the localize button.
pub fn localized_text(token: &CallbackToken, localized: &LocalizedTime) -> String {
    format!(
        "{} UTC, which is {} in {}",
        token,
        localized.local.format("%H:%M"),
        localized.timezone.name()
    )
}

pub fn set_confirmation_text(tz: Tz) -> String {
    format!("Your timezone was set to {}", tz.name())
}
