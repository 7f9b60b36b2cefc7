//! Informal timezone tokens that the IANA database itself does not know.
//!
//! First tier of resolution: a small static table of city names and zone
//! abbreviations, extensible from configuration so deployments can add their
//! own shorthands without forking the pipeline.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use phf::phf_map;

/// Built-in aliases, keyed by lowercase token.
///
/// "gmt" maps to `Tz::UTC` rather than `Etc/GMT` so every case variant of
/// GMT resolves to the canonical UTC identifier.
static BUILTIN_ALIASES: phf::Map<&'static str, Tz> = phf_map! {
    // zone abbreviations
    "utc" => Tz::UTC,
    "gmt" => Tz::UTC,
    "pst" => Tz::America__Los_Angeles,
    "pdt" => Tz::America__Los_Angeles,
    "mst" => Tz::America__Denver,
    "mdt" => Tz::America__Denver,
    "cst" => Tz::America__Chicago,
    "cdt" => Tz::America__Chicago,
    "est" => Tz::America__New_York,
    "edt" => Tz::America__New_York,
    "bst" => Tz::Europe__London,
    "cet" => Tz::Europe__Berlin,
    "cest" => Tz::Europe__Berlin,
    "eet" => Tz::Europe__Helsinki,
    "eest" => Tz::Europe__Helsinki,
    "msk" => Tz::Europe__Moscow,
    "ist" => Tz::Asia__Kolkata,
    "jst" => Tz::Asia__Tokyo,
    "kst" => Tz::Asia__Seoul,
    "aest" => Tz::Australia__Sydney,
    "aedt" => Tz::Australia__Sydney,
    "nzst" => Tz::Pacific__Auckland,
    // city shorthands
    "moscow" => Tz::Europe__Moscow,
    "berlin" => Tz::Europe__Berlin,
    "london" => Tz::Europe__London,
    "paris" => Tz::Europe__Paris,
    "madrid" => Tz::Europe__Madrid,
    "rome" => Tz::Europe__Rome,
    "kyiv" => Tz::Europe__Kyiv,
    "tokyo" => Tz::Asia__Tokyo,
    "seoul" => Tz::Asia__Seoul,
    "delhi" => Tz::Asia__Kolkata,
    "mumbai" => Tz::Asia__Kolkata,
    "beijing" => Tz::Asia__Shanghai,
    "shanghai" => Tz::Asia__Shanghai,
    "singapore" => Tz::Asia__Singapore,
    "dubai" => Tz::Asia__Dubai,
    "sydney" => Tz::Australia__Sydney,
    "nyc" => Tz::America__New_York,
    "chicago" => Tz::America__Chicago,
    "denver" => Tz::America__Denver,
    "seattle" => Tz::America__Los_Angeles,
};

/// Static table plus runtime extensions. Extensions shadow built-ins, so a
/// deployment can repoint an abbreviation (e.g. "ist" to Israel time).
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    extra: HashMap<String, Tz>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from config entries of `token = "IANA/Name"`.
    pub fn from_config(entries: &HashMap<String, String>) -> Result<Self> {
        let mut table = Self::new();
        for (token, name) in entries {
            let tz = Tz::from_str(name)
                .map_err(|_| anyhow!("unknown timezone {:?} for alias {:?}", name, token))?;
            table.insert(token, tz);
        }
        Ok(table)
    }

    pub fn insert(&mut self, token: &str, tz: Tz) {
        self.extra.insert(token.to_lowercase(), tz);
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, token: &str) -> Option<Tz> {
        let key = token.to_lowercase();
        self.extra
            .get(&key)
            .copied()
            .or_else(|| BUILTIN_ALIASES.get(key.as_str()).copied())
    }
}
