//! Configuration system
//!
//! Provides configuration management with:
//! - Environment variable support
//! - Config file loading (optional, `basic` feature)
//! - Runtime defaults
//! - Validation
//!
//! The billing frame offset is deliberately absent: it is a property of the
//! billing export, see [`crate::timestamp_parser::BILLING_UTC_OFFSET_HOURS`].

use crate::tables::LookupTables;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub output: OutputConfig,
    pub billing: BillingConfig,
    pub tables: TablesConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub json_pretty: bool,
    /// Decimal places for normalized values in the console report
    pub value_precision: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub product_name: String,
    /// Usage type prefixes (before `:`) that denote a running instance
    pub usage_type_markers: Vec<String>,
}

/// Extra lookup entries merged over the built-in tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub operation_platforms: BTreeMap<String, String>,
    pub normalization_factors: BTreeMap<String, f64>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "WARN".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("logs"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_pretty: true,
            value_precision: 2,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            product_name: "Amazon Elastic Compute Cloud".to_string(),
            usage_type_markers: vec!["BoxUsage".to_string(), "HeavyUsage".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from file, environment and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let mut config_paths = Vec::new();
        if let Ok(explicit) = env::var("RI_COVERAGE_CONFIG") {
            config_paths.push(PathBuf::from(explicit));
        }
        config_paths.push(PathBuf::from("ri-coverage.toml"));
        config_paths.push(PathBuf::from(".ri-coverage.toml"));
        if let Some(dir) = dirs::config_dir() {
            config_paths.push(dir.join("ri-coverage").join("config.toml"));
        }

        for path in &config_paths {
            if path.exists() {
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    #[cfg(feature = "basic")]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        Ok(config)
    }

    #[cfg(not(feature = "basic"))]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        anyhow::bail!(
            "Config file {} found but config file support is disabled (enable the `basic` feature)",
            path.display()
        )
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }
        if let Ok(val) = env::var("RI_COVERAGE_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("RI_COVERAGE_PRODUCT_NAME") {
            self.billing.product_name = val;
        }
        if let Ok(val) = env::var("RI_COVERAGE_VALUE_PRECISION") {
            self.output.value_precision = val
                .parse()
                .context("Invalid RI_COVERAGE_VALUE_PRECISION")?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!(
                "Log format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            );
        }

        if !matches!(self.logging.output.as_str(), "console" | "file" | "both") {
            anyhow::bail!(
                "Log output must be 'console', 'file' or 'both', got '{}'",
                self.logging.output
            );
        }

        if self.output.value_precision > 8 {
            anyhow::bail!(
                "Value precision must be at most 8 decimal places, got {}",
                self.output.value_precision
            );
        }

        if self.billing.product_name.trim().is_empty() {
            anyhow::bail!("Billing product name cannot be empty");
        }

        if self.billing.usage_type_markers.is_empty()
            || self.billing.usage_type_markers.iter().any(|m| m.trim().is_empty())
        {
            anyhow::bail!("Usage type markers must be a non-empty list of non-empty strings");
        }

        for (size, factor) in &self.tables.normalization_factors {
            if !factor.is_finite() || *factor < 0.0 {
                anyhow::bail!(
                    "Normalization factor for '{}' must be a non-negative number, got {}",
                    size,
                    factor
                );
            }
        }

        for (operation, platform) in &self.tables.operation_platforms {
            if platform.trim().is_empty() {
                warn!(operation = %operation, "Operation mapped to an empty platform name");
            }
        }

        // Only create the log directory when something will write to it
        if self.logging.output != "console" && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }

        Ok(())
    }

    /// Lookup tables with configured entries applied
    pub fn lookup_tables(&self) -> LookupTables {
        LookupTables::with_overrides(
            &self.tables.operation_platforms,
            &self.tables.normalization_factors,
        )
    }

    /// Save current configuration to file
    #[cfg(feature = "basic")]
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}
