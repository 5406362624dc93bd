//! Configuration management infrastructure.
//!
//! Persists repository preferences (publication base URI, CA names, validity
//! windows, key size and digest) as TOML and derives the `CaSettings` used to
//! build authorities.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::authority::CaSettings;
use crate::domain::crypto::DigestAlgorithm;
use crate::infra::error::{ForgeError, ForgeResult};

/// Repository configuration with all CA preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfiguration {
    /// rsync base URI of the publication tree
    pub base_uri: String,

    /// Common name of the trust anchor
    pub trust_anchor_name: String,

    /// Common name of the demo subordinate CA
    pub ca_name: String,

    /// Validity of issued certificates
    pub cert_validity_days: u32,

    /// Distance between CRL thisUpdate and nextUpdate
    pub crl_days: u32,

    /// Distance between manifest thisUpdate and nextUpdate
    pub manifest_days: u32,

    /// RSA modulus size for generated keys
    pub key_bits: u32,

    /// Digest algorithm name (sha256, sha384, sha512)
    pub digest_algorithm: String,
}

impl Default for RepositoryConfiguration {
    fn default() -> Self {
        let settings = CaSettings::default();
        Self {
            base_uri: settings.base_uri,
            trust_anchor_name: "TA".to_string(),
            ca_name: "CA".to_string(),
            cert_validity_days: settings.cert_validity_days,
            crl_days: settings.crl_days,
            manifest_days: settings.manifest_days,
            key_bits: settings.key_bits,
            digest_algorithm: settings.digest.as_str().to_string(),
        }
    }
}

impl RepositoryConfiguration {
    /// Settings handed to every CA of the repository.
    pub fn ca_settings(&self) -> ForgeResult<CaSettings> {
        Ok(CaSettings {
            base_uri: self.base_uri.clone(),
            key_bits: self.key_bits,
            digest: self.digest()?,
            cert_validity_days: self.cert_validity_days,
            crl_days: self.crl_days,
            manifest_days: self.manifest_days,
        })
    }

    pub fn digest(&self) -> ForgeResult<DigestAlgorithm> {
        self.digest_algorithm.parse::<DigestAlgorithm>().map_err(|_| {
            ForgeError::ConfigurationError(format!(
                "Invalid digest algorithm: {}",
                self.digest_algorithm
            ))
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> ForgeResult<()> {
        self.digest()?;

        if !self.base_uri.starts_with("rsync://") && !self.base_uri.starts_with("https://") {
            return Err(ForgeError::ConfigurationError(format!(
                "Base URI must be rsync:// or https://, got '{}'",
                self.base_uri
            )));
        }

        for name in [&self.trust_anchor_name, &self.ca_name] {
            if name.is_empty() || name.contains('/') {
                return Err(ForgeError::ConfigurationError(format!(
                    "Invalid CA name: '{name}'"
                )));
            }
        }

        if self.cert_validity_days == 0 || self.crl_days == 0 || self.manifest_days == 0 {
            return Err(ForgeError::ConfigurationError(
                "Validity periods must be greater than 0 days".to_string(),
            ));
        }

        if self.key_bits < 1024 {
            return Err(ForgeError::ConfigurationError(format!(
                "RSA key size too small: {}",
                self.key_bits
            )));
        }

        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(config_dir) => config_dir.join("rpki-forge").join("config.toml"),
            None => PathBuf::from("rpki-forge-config.toml"),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> ForgeResult<RepositoryConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = RepositoryConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load from file if present, otherwise use defaults without writing.
    pub fn load_or_default(&self) -> ForgeResult<RepositoryConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                self.config_path.display()
            );
            Ok(RepositoryConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> ForgeResult<RepositoryConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            ForgeError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: RepositoryConfiguration = toml::from_str(&content).map_err(|e| {
            ForgeError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &RepositoryConfiguration) -> ForgeResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ForgeError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            ForgeError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            ForgeError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        log::info!("Configuration saved successfully");
        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> ForgeResult<()> {
        let mut config = self.load_or_default()?;

        let parse_days = |value: &str| {
            value.parse::<u32>().map_err(|_| {
                ForgeError::ConfigurationError(format!("Invalid number of days: {value}"))
            })
        };

        match key {
            "base_uri" => config.base_uri = value.to_string(),
            "trust_anchor_name" => config.trust_anchor_name = value.to_string(),
            "ca_name" => config.ca_name = value.to_string(),
            "cert_validity_days" => config.cert_validity_days = parse_days(value)?,
            "crl_days" => config.crl_days = parse_days(value)?,
            "manifest_days" => config.manifest_days = parse_days(value)?,
            "key_bits" => {
                config.key_bits = value.parse().map_err(|_| {
                    ForgeError::ConfigurationError(format!("Invalid key size: {value}"))
                })?;
            }
            "digest_algorithm" => config.digest_algorithm = value.to_string(),
            _ => {
                return Err(ForgeError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        config.validate()?;
        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> ForgeResult<String> {
        let config = self.load_or_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| ForgeError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| ForgeError::ConfigurationError(format!("JSON export failed: {e}"))),
        }
    }

    /// Import configuration from a string
    pub fn import_config(&self, content: &str, format: ExportFormat) -> ForgeResult<()> {
        let config: RepositoryConfiguration = match format {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| {
                ForgeError::ConfigurationError(format!("TOML import failed: {e}"))
            })?,
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| {
                ForgeError::ConfigurationError(format!("JSON import failed: {e}"))
            })?,
        };

        config.validate()?;
        self.save(&config)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RepositoryConfiguration::default();
        assert_eq!(config.trust_anchor_name, "TA");
        assert_eq!(config.digest_algorithm, "sha256");
        assert!(config.validate().is_ok());
        assert_eq!(config.ca_settings().unwrap(), CaSettings::default());
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let mut config = RepositoryConfiguration::default();
        config.base_uri = "rsync://repo.example.org/module".to_string();
        config.digest_algorithm = "sha512".to_string();

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.digest().unwrap(), DigestAlgorithm::Sha512);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RepositoryConfiguration::default();
        config.digest_algorithm = "md5".to_string();
        assert!(config.validate().is_err());

        let mut config = RepositoryConfiguration::default();
        config.base_uri = "ftp://example.net".to_string();
        assert!(config.validate().is_err());

        let mut config = RepositoryConfiguration::default();
        config.crl_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_update_and_export() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));
        manager.load_or_create_default().unwrap();

        manager.update_value("manifest_days", "2").unwrap();
        assert_eq!(manager.load().unwrap().manifest_days, 2);
        assert!(manager.update_value("manifest_days", "soon").is_err());
        assert!(manager.update_value("nonsense", "1").is_err());

        let json = manager.export_config(ExportFormat::Json).unwrap();
        assert!(json.contains("\"manifest_days\": 2"));
        manager.import_config(&json, ExportFormat::Json).unwrap();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "ca_name = \"CA1\"\n").unwrap();
        let config = ConfigManager::with_path(&path).load().unwrap();
        assert_eq!(config.ca_name, "CA1");
        assert_eq!(config.trust_anchor_name, "TA");
    }
}
