use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::parse_date;

pub const DEFAULT_CONFIG_FILE: &str = "regime-dashboard.toml";
const ENV_PREFIX: &str = "REGIME";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub dashboard: DashboardSettings,
}

/// Connection settings for the external analysis service, injected into
/// the API client at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub port: u16,
    pub default_ticker: String,
    pub default_start: String,
    pub default_end: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            port: 3000,
            default_ticker: "AAPL".to_string(),
            default_start: "2023-01-01".to_string(),
            default_end: "2026-01-01".to_string(),
        }
    }
}

impl DashboardSettings {
    pub fn default_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        let start = parse_date(&self.default_start)
            .with_context(|| format!("invalid default_start '{}'", self.default_start))?;
        let end = parse_date(&self.default_end)
            .with_context(|| format!("invalid default_end '{}'", self.default_end))?;
        Ok((start, end))
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then `REGIME_*` environment
    /// variables (`REGIME_SERVICE__BASE_URL=...`).
    pub fn load(path: &str) -> Result<Self> {
        if dotenvy::dotenv().is_ok() {
            debug!("Loaded .env file");
        }

        let exists = Path::new(path).exists();
        let settings: Settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path))?
            .try_deserialize()
            .context("invalid configuration")?;

        if exists {
            info!("Configuration loaded from {}", path);
        } else {
            debug!("No configuration file at {}, using defaults and environment", path);
        }

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let base_url = self.service.base_url.trim();
        if base_url.is_empty() {
            errors.push("service.base_url must not be empty".to_string());
        } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push("service.base_url must start with http:// or https://".to_string());
        }
        if self.service.timeout_secs == 0 {
            errors.push("service.timeout_secs must be > 0".to_string());
        }

        if self.dashboard.port == 0 {
            errors.push("dashboard.port must be > 0".to_string());
        }
        if self.dashboard.default_ticker.trim().is_empty() {
            errors.push("dashboard.default_ticker must not be empty".to_string());
        }
        match self.dashboard.default_range() {
            Ok((start, end)) if start > end => {
                errors.push("dashboard.default_start must not be after default_end".to_string());
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("dashboard: {:#}", e)),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.service.timeout(), Duration::from_secs(30));
        assert_eq!(settings.dashboard.port, 3000);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut settings = Settings::default();
        settings.service.base_url = "localhost:8000".to_string();
        settings.service.timeout_secs = 0;
        settings.dashboard.default_start = "2026-02-01".to_string();

        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("base_url"));
        assert!(errors[2].contains("default_start"));
    }

    #[test]
    fn test_bad_default_date_reported() {
        let mut settings = Settings::default();
        settings.dashboard.default_end = "soon".to_string();
        let errors = settings.validate().unwrap_err();
        assert!(errors[0].contains("default_end"));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let settings = Settings::load("does-not-exist.toml").unwrap();
        assert_eq!(settings.dashboard.default_ticker, "AAPL");
    }
}
