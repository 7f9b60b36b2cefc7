//! Lexical extraction of time-like expressions from free-form chat text.
//!
//! The scanner is a best-effort lexer: it produces *candidates*, and the
//! resolver decides which of them actually name a timezone. A match is a
//! `(hour, minute, meridiem, timezone-token)` tuple such as the one produced
//! by "9pm berlin" or "14:30 gmt".

use std::fmt;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Hour 0-23, optional `:`/`.`-separated minute, optional meridiem, then a
/// trailing token of 2+ letters with an optional single `/` segment
/// (`Asia/Tokyo`).
static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(2[0-3]|[01]?\d)(?:[:.]([0-5]\d))? ?([ap]\.?m\.?)? ?([a-z]{2,}(?:/[a-z]{2,})?)")
        .unwrap()
});

/// Characters that disqualify a match when they immediately precede it.
/// Keeps the scanner out of IDs, handles, hashtags and numeric codes.
const GUARD_CHARS: &[char] = &['@', '#', '$', '%', '^', '&'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    /// Accepts the scanned forms: `am`, `a.m.`, `pm`, `p.m.` in any case.
    fn from_token(token: &str) -> Option<Self> {
        match token.to_lowercase().replace('.', "").as_str() {
            "am" => Some(Meridiem::Am),
            "pm" => Some(Meridiem::Pm),
            _ => None,
        }
    }
}

impl fmt::Display for Meridiem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Meridiem::Am => write!(f, "am"),
            Meridiem::Pm => write!(f, "pm"),
        }
    }
}

/// One scanned candidate. `hour` is 0-23 by construction of the pattern;
/// an absent minute means `:00`. The token is unresolved text at this stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeExpression {
    pub hour: u32,
    pub minute: Option<u32>,
    pub meridiem: Option<Meridiem>,
    pub timezone_token: String,
}

/// Regex-driven scanner over message text.
///
/// The boundary guard is configuration rather than a forked pattern: the
/// legacy scanner ran without it and matched inside numeric fragments.
#[derive(Debug, Clone)]
pub struct TimeScanner {
    boundary_guard: bool,
}

impl Default for TimeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeScanner {
    pub fn new() -> Self {
        Self { boundary_guard: true }
    }

    /// Legacy behavior: no look-behind guard, known false-positive source.
    pub fn without_boundary_guard() -> Self {
        Self { boundary_guard: false }
    }

    /// Returns all candidates in text order. Never fails; text with no
    /// time-like substring yields an empty vec.
    pub fn scan(&self, text: &str) -> Vec<TimeExpression> {
        let mut expressions = Vec::new();

        for caps in TIME_PATTERN.captures_iter(text) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };

            if self.boundary_guard && !boundary_ok(text, whole.start()) {
                debug!("guard rejected match {:?} at offset {}", whole.as_str(), whole.start());
                continue;
            }

            let hour = match caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
                Some(h) => h,
                None => continue,
            };
            let minute = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
            let meridiem = caps.get(3).and_then(|m| Meridiem::from_token(m.as_str()));
            let timezone_token = match caps.get(4) {
                Some(m) => m.as_str().to_string(),
                None => continue,
            };

            debug!(
                "scanned candidate {}:{} {:?} {:?}",
                hour,
                minute.unwrap_or(0),
                meridiem,
                timezone_token
            );
            expressions.push(TimeExpression { hour, minute, meridiem, timezone_token });
        }

        expressions
    }
}

/// The `regex` crate has no look-behind, so the guard inspects the character
/// immediately before the match instead. Behavior is identical: a candidate
/// preceded by a digit or a symbol character is dropped.
fn boundary_ok(text: &str, start: usize) -> bool {
    match text[..start].chars().next_back() {
        Some(c) => !c.is_ascii_digit() && !GUARD_CHARS.contains(&c),
        None => true,
    }
}
