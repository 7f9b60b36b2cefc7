use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::providers::{DEFAULT_GEONAMES_URL, DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT};

/// The historical deployments forked the pipeline three times to vary the
/// alias table and scanner guard; those axes are plain configuration here.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// Extra alias entries, token = "IANA/Name". Shadow the built-ins.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Reject matches preceded by a digit or symbol character. Off
    /// reproduces the legacy scanner's false positives.
    pub boundary_guard: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self { boundary_guard: true }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub nominatim_url: String,
    pub geonames_url: String,
    /// Without a GeoNames account the slow resolution tier stays disabled.
    pub geonames_username: Option<String>,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            geonames_url: DEFAULT_GEONAMES_URL.to_string(),
            geonames_username: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        // If config doesn't exist, create default
        if !config_path.exists() {
            let default_config = Config::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.geocoding.timeout_seconds)
    }
}

fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "localzone", "localzone")
        .context("Failed to determine config directory")?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_guard_on_and_geocoding_off() {
        let config = Config::default();
        assert!(config.scanner.boundary_guard);
        assert!(config.geocoding.geonames_username.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scanner]
            boundary_guard = false

            [aliases]
            hq = "Europe/Berlin"
            "#,
        )
        .unwrap();

        assert!(!config.scanner.boundary_guard);
        assert_eq!(config.aliases.get("hq"), Some(&"Europe/Berlin".to_string()));
        assert_eq!(config.geocoding.nominatim_url, DEFAULT_NOMINATIM_URL);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.geocoding.geonames_username = Some("demo".to_string());
        let text = toml::to_string_pretty(&config).unwrap();
        let loaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(loaded.geocoding.geonames_username, Some("demo".to_string()));
    }
}
