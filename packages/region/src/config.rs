//! Gateway configuration.
//!
//! Defaults are embedded from `config/gateway.toml` at compile time and
//! can be overridden per deployment through environment variables:
//!
//! | Variable                  | Field          |
//! |---------------------------|----------------|
//! | `FLOOD_MAP_OVERPASS_URL`  | `overpass_url` |
//! | `FLOOD_MAP_STATUS_URL`    | `status_url`   |
//! | `FLOOD_MAP_ADMIN_LEVEL`   | `admin_level`  |
//! | `FLOOD_MAP_TIMEOUT_SECS`  | `timeout_secs` |
//! | `FLOOD_MAP_TOKEN`         | `token`        |
//!
//! The token is never read from the TOML file. When it is absent the
//! gateway sends unauthenticated requests.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_GATEWAY_TOML: &str = include_str!("../config/gateway.toml");

/// Errors from loading gateway configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value was present but unusable.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Which setting was rejected and why.
        message: String,
    },
}

/// Connection settings for the HTTP region gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    /// Overpass API interpreter endpoint.
    pub overpass_url: String,
    /// Flood depth status feed endpoint.
    pub status_url: String,
    /// OSM `admin_level` of the dashboard's regions.
    pub admin_level: u8,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Opaque bearer token attached to every request when present.
    #[serde(skip)]
    pub token: Option<String>,
}

impl GatewayConfig {
    /// Loads the embedded defaults and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded TOML is malformed or an
    /// override cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_GATEWAY_TOML)?.with_overrides(|key| std::env::var(key).ok())
    }

    /// Parses a TOML document without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is malformed or fails
    /// validation.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric override does not
    /// parse or the result fails validation.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FLOOD_MAP_OVERPASS_URL") {
            self.overpass_url = url;
        }
        if let Some(url) = lookup("FLOOD_MAP_STATUS_URL") {
            self.status_url = url;
        }
        if let Some(level) = lookup("FLOOD_MAP_ADMIN_LEVEL") {
            self.admin_level = parse_override("FLOOD_MAP_ADMIN_LEVEL", &level)?;
        }
        if let Some(secs) = lookup("FLOOD_MAP_TIMEOUT_SECS") {
            self.timeout_secs = parse_override("FLOOD_MAP_TIMEOUT_SECS", &secs)?;
        }
        self.token = lookup("FLOOD_MAP_TOKEN").filter(|t| !t.trim().is_empty());
        self.validate()
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.overpass_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "overpass_url is empty".to_string(),
            });
        }
        if self.status_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "status_url is empty".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "timeout_secs must be positive".to_string(),
            });
        }
        Ok(self)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        message: format!("{key}={value:?} is not a valid number"),
    })
}
