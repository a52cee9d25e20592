//! Configuration management for solarscout
//!
//! All configuration is loaded from `./config/solarscout.toml`.
//! No hardcoded defaults exist in source code - all defaults are in the config template.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/solarscout.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/solarscout.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub discovery: DiscoveryConfig,
    pub geocoding: GeocodingConfig,
    pub rate_limit: RateLimitConfig,
    pub estimator: EstimatorConfig,
}

/// HTTP client configuration for website and robots.txt fetches
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub website_timeout_secs: u64,
    pub robots_timeout_secs: u64,
    pub max_body_bytes: usize,
}

/// Geo-discovery (Overpass) client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub default_radius_m: u32,
}

/// Geocoding (Nominatim) client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

/// Minimum inter-request spacing per external service
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub discovery_interval_ms: u64,
    pub website_interval_ms: u64,
}

/// Capacity estimator constants.
///
/// The confidence values are heuristic placeholders carried over from the
/// original directory application; they have no stated statistical derivation.
#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    pub portfolio_confidence: f64,
    pub heuristic_confidence: f64,
    pub floor_confidence: f64,
    pub commercial_unit_kw: f64,
    pub residential_unit_kw: f64,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate HTTP config
        if self.http.user_agent.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.website_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.website_timeout_secs".to_string(),
                reason: "timeout must be non-zero".to_string(),
            });
        }
        if self.http.robots_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.robots_timeout_secs".to_string(),
                reason: "timeout must be non-zero".to_string(),
            });
        }
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.max_body_bytes".to_string(),
                reason: "body cap must be non-zero".to_string(),
            });
        }

        // Validate service endpoints
        Self::validate_endpoint("discovery.endpoint", &self.discovery.endpoint)?;
        Self::validate_endpoint("geocoding.endpoint", &self.geocoding.endpoint)?;
        if self.discovery.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "discovery.request_timeout_secs".to_string(),
                reason: "timeout must be non-zero".to_string(),
            });
        }
        if self.geocoding.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "geocoding.request_timeout_secs".to_string(),
                reason: "timeout must be non-zero".to_string(),
            });
        }
        if self.discovery.default_radius_m == 0 {
            return Err(ConfigError::InvalidValue {
                field: "discovery.default_radius_m".to_string(),
                reason: "radius must be non-zero".to_string(),
            });
        }

        // Validate estimator constants
        for (field, value) in [
            ("estimator.portfolio_confidence", self.estimator.portfolio_confidence),
            ("estimator.heuristic_confidence", self.estimator.heuristic_confidence),
            ("estimator.floor_confidence", self.estimator.floor_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("confidence {} outside [0, 1]", value),
                });
            }
        }
        if self.estimator.commercial_unit_kw <= 0.0 || self.estimator.residential_unit_kw <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "estimator unit sizes".to_string(),
                reason: "unit sizes must be positive".to_string(),
            });
        }

        Ok(())
    }

    fn validate_endpoint(field: &str, url: &str) -> Result<(), ConfigError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl {
                field: field.to_string(),
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write default config
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        atty::is(atty::Stream::Stdin)
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}
