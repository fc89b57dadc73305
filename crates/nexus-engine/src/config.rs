//! # Engine Configuration
//!
//! Settings the engine reads once at startup.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     NEXUS_DB_PATH=/srv/nexus/nexus.db                                  │
//! │     NEXUS_MIN_MARGIN_BPS=2500                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/nexus-inventory/nexus.toml (Linux)                       │
//! │     ~/Library/Application Support/com.nexus.inventory/nexus.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     25% margin floor, invoice seed "1001", <data_dir>/nexus.db         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # nexus.toml
//! [database]
//! path = "/srv/nexus/nexus.db"
//! max_connections = 5
//!
//! [pricing]
//! min_margin_bps = 2500  # 25% over cost
//!
//! [invoice]
//! seed = "SI-1001"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use nexus_core::invoice::DEFAULT_INVOICE_SEED;
use nexus_core::pricing::DEFAULT_MIN_MARGIN_BPS;
use nexus_core::MarginPolicy;

// =============================================================================
// Errors
// =============================================================================

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No data directory available; set NEXUS_DB_PATH")]
    NoDataDir,
}

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file. `None` resolves to `<data_dir>/nexus.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: 5,
        }
    }
}

/// `[pricing]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSettings {
    /// Minimum margin over cost in basis points (2500 = price ≥ cost / 0.75).
    pub min_margin_bps: u32,
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            min_margin_bps: DEFAULT_MIN_MARGIN_BPS,
        }
    }
}

/// `[invoice]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceSettings {
    /// First invoice number handed out when the sequence was never stored.
    pub seed: String,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        InvoiceSettings {
            seed: DEFAULT_INVOICE_SEED.to_string(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub invoice: InvoiceSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, or nexus.toml in the platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing sections keep their defaults.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pricing.min_margin_bps >= 10_000 {
            return Err(ConfigError::Invalid(
                "pricing.min_margin_bps must be below 10000".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.invoice.seed.trim().is_empty() {
            return Err(ConfigError::Invalid("invoice.seed must not be empty".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = std::env::var("NEXUS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(value) = std::env::var("NEXUS_DB_MAX_CONNECTIONS") {
            self.database.max_connections = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("NEXUS_DB_MAX_CONNECTIONS".into()))?;
        }

        if let Ok(value) = std::env::var("NEXUS_MIN_MARGIN_BPS") {
            self.pricing.min_margin_bps = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("NEXUS_MIN_MARGIN_BPS".into()))?;
        }

        if let Ok(seed) = std::env::var("NEXUS_INVOICE_SEED") {
            if seed.trim().is_empty() {
                warn!("Ignoring empty NEXUS_INVOICE_SEED");
            } else {
                self.invoice.seed = seed;
            }
        }

        Ok(())
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "nexus", "inventory")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("nexus.toml"))
    }

    /// The database file to open.
    ///
    /// - Linux: ~/.local/share/inventory/nexus.db
    /// - macOS: ~/Library/Application Support/com.nexus.inventory/nexus.db
    /// - Windows: %APPDATA%/nexus/inventory/data/nexus.db
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("nexus.db"))
            .ok_or(ConfigError::NoDataDir)
    }

    pub fn margin_policy(&self) -> MarginPolicy {
        MarginPolicy::new(self.pricing.min_margin_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pricing.min_margin_bps, 2500);
        assert_eq!(config.invoice.seed, "1001");
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [pricing]
            min_margin_bps = 3000
            "#,
        )
        .unwrap();

        assert_eq!(config.pricing.min_margin_bps, 3000);
        assert_eq!(config.invoice.seed, "1001");
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_full_toml() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = "/srv/nexus/nexus.db"
            max_connections = 8

            [invoice]
            seed = "SI-0001"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/srv/nexus/nexus.db")
        );
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.invoice.seed, "SI-0001");
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.pricing.min_margin_bps = 10_000;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.invoice.seed = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[pricing]"));
        assert!(toml_str.contains("[invoice]"));
    }
}
