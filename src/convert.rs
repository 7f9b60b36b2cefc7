//! Local/UTC time arithmetic at minute precision.
//!
//! Conversion always evaluates the timezone's UTC offset at the *reference
//! instant* ("today"), never at the message's authored date. That matches
//! the historical behavior of the system and is deliberately preserved; the
//! wrappers without a `reference` parameter pass `Utc::now()`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::PipelineError;
use crate::scanner::{Meridiem, TimeExpression};

const MINUTES_PER_DAY: i32 = 24 * 60;

/// A matched message's time, pinned to a timezone and to UTC.
///
/// The `utc` field is what gets serialized into the callback token and
/// replayed verbatim later; it is never recomputed from the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstant {
    pub local: NaiveTime,
    pub timezone: Tz,
    pub utc: NaiveTime,
}

impl ResolvedInstant {
    pub fn callback_token(&self) -> CallbackToken {
        CallbackToken(self.utc)
    }
}

/// Opaque `HH:MM` token carried through the chat platform's interactive
/// element. Zero-padded 24-hour form; parsing is strict so the token
/// round-trips exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackToken(NaiveTime);

impl CallbackToken {
    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for CallbackToken {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || PipelineError::BadCallbackToken(s.to_string());
        let time = NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| bad())?;
        // reject non-canonical forms like "9:5" up front
        if time.format("%H:%M").to_string() != s {
            return Err(bad());
        }
        Ok(Self(time))
    }
}

/// 12-hour to 24-hour normalization. A meridiem on an hour above 12 is
/// invalid input and aborts processing of the message.
pub fn normalize_hour(hour: u32, meridiem: Option<Meridiem>) -> Result<u32, PipelineError> {
    match meridiem {
        None => Ok(hour),
        Some(m) if hour > 12 => Err(PipelineError::InvalidHourForMeridiem { hour, meridiem: m }),
        Some(Meridiem::Am) => Ok(if hour == 12 { 0 } else { hour }),
        Some(Meridiem::Pm) => Ok(if hour == 12 { 12 } else { hour + 12 }),
    }
}

/// Offset of `tz` from UTC in minutes, evaluated at `reference` so the
/// current DST rule applies.
pub fn utc_offset_minutes(tz: Tz, reference: DateTime<Utc>) -> i32 {
    tz.offset_from_utc_datetime(&reference.naive_utc()).fix().local_minus_utc() / 60
}

/// Converts a scanned expression in `tz` to a UTC instant on the reference
/// date. Seconds are discarded throughout.
pub fn to_utc(
    expr: &TimeExpression,
    tz: Tz,
    reference: DateTime<Utc>,
) -> Result<ResolvedInstant, PipelineError> {
    let hour = normalize_hour(expr.hour, expr.meridiem)?;
    let minute = expr.minute.unwrap_or(0);
    let local = from_minute_of_day((hour * 60 + minute) as i32);
    let utc = from_minute_of_day(
        (local.hour() * 60 + local.minute()) as i32 - utc_offset_minutes(tz, reference),
    );
    Ok(ResolvedInstant { local, timezone: tz, utc })
}

/// Converts a stored UTC instant back into `tz`'s wall-clock time.
pub fn to_local(utc: NaiveTime, tz: Tz, reference: DateTime<Utc>) -> NaiveTime {
    from_minute_of_day((utc.hour() * 60 + utc.minute()) as i32 + utc_offset_minutes(tz, reference))
}

fn from_minute_of_day(total: i32) -> NaiveTime {
    let total = total.rem_euclid(MINUTES_PER_DAY) as u32;
    // always in range after rem_euclid
    NaiveTime::from_hms_opt(total / 60, total % 60, 0).unwrap_or(NaiveTime::MIN)
}
