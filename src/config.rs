//! Configuration system for the tetrahedron CLI
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (TETRA_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{LossType, MissingNodeProtocol, ProtocolSnapshot, StabilizationPolicy};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetraConfig {
    /// Missing-node protocol settings
    pub protocol: ProtocolSettings,

    /// Where state is persisted
    pub storage: StorageSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Missing-node protocol settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Unanimity also requires a vote from every remaining member (off by default)
    pub require_full_triad_vote: bool,

    /// Minimum stabilization days per loss type
    pub stabilization: StabilizationPolicy,
}

/// Storage path settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON file holding modules and protocol state
    pub state_file: String,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            require_full_triad_vote: false,
            stabilization: StabilizationPolicy::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            state_file: "~/.tetrahedron/state.json".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl TetraConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|source| Error::IoRead {
                path: path.clone(),
                source,
            })?;
            config = toml::from_str(&content).map_err(|e| {
                Error::config_parse(format!("{}: {}", path.display(), e.message()), Some(e))
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // An explicit path must exist
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        for path in Self::search_paths() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Standard locations, searched in order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("tetrahedron.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("tetrahedron").join("config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".tetrahedron").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/tetrahedron/config.toml"));
        paths
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Storage settings
        if let Some(val) = lookup("TETRA_STATE_FILE") {
            self.storage.state_file = val;
        }

        // Logging settings
        if let Some(val) = lookup("TETRA_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("TETRA_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Some(val) = lookup("TETRA_LOG_JSON") {
            self.logging.json_format = parse_flag(&val);
        }

        // Protocol settings
        if let Some(val) = lookup("TETRA_REQUIRE_FULL_TRIAD_VOTE") {
            self.protocol.require_full_triad_vote = parse_flag(&val);
        }
        for loss_type in LossType::all() {
            let key = format!("TETRA_MIN_DAYS_{}", loss_type.slug().to_uppercase());
            if let Some(days) = lookup(&key).and_then(|v| v.parse().ok()) {
                self.protocol.stabilization.set_minimum_days(*loss_type, days);
            }
        }
    }

    /// Expand ~ and other path variables
    pub fn expand_paths(&mut self) {
        self.storage.state_file = expand_path(&self.storage.state_file);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.storage.state_file.trim().is_empty() {
            return Err(Error::Config("storage.state_file cannot be empty".to_string()));
        }

        for loss_type in LossType::all() {
            if self.protocol.stabilization.minimum_days(*loss_type) == 0 {
                return Err(Error::Config(format!(
                    "protocol.stabilization.{} must be at least 1 day",
                    loss_type
                )));
            }
        }

        Ok(())
    }

    /// Get the state file as a PathBuf
    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(&self.storage.state_file)
    }

    /// An empty protocol using these settings
    pub fn build_protocol(&self) -> MissingNodeProtocol {
        MissingNodeProtocol::with_policy(self.protocol.stabilization)
            .require_full_triad_vote(self.protocol.require_full_triad_vote)
    }

    /// A protocol restored from a snapshot using these settings
    pub fn restore_protocol(&self, snapshot: ProtocolSnapshot) -> MissingNodeProtocol {
        MissingNodeProtocol::from_snapshot(self.protocol.stabilization, snapshot)
            .require_full_triad_vote(self.protocol.require_full_triad_vote)
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Expand ~ and environment variables in paths
pub fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location for a new configuration file
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tetrahedron")
        .join("config.toml")
}

/// Initialize a new configuration file, returning where it was written
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|source| Error::IoWrite {
        path: config_path.clone(),
        source,
    })?;

    info!(path = %config_path.display(), "Configuration file created");
    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# Tetrahedron Configuration

[protocol]
# Make unanimous decisions also wait for a vote from every remaining triad member
require_full_triad_vote = false

[protocol.stabilization]
# Minimum days a triad stabilizes after each kind of loss
death = 90
departure = 30
distance = 14
drift = 21
disagreement = 60
temporary = 7

[storage]
# JSON file holding modules and memorial state
state_file = "~/.tetrahedron/state.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.tetrahedron/logs/tetrahedron.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TetraConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.protocol.require_full_triad_vote);
        assert_eq!(config.protocol.stabilization, StabilizationPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TETRA_STATE_FILE", "/tmp/tetra.json"),
            ("TETRA_LOG_LEVEL", "debug"),
            ("TETRA_LOG_JSON", "1"),
            ("TETRA_MIN_DAYS_DRIFT", "28"),
            ("TETRA_MIN_DAYS_DEATH", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = TetraConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.storage.state_file, "/tmp/tetra.json");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.protocol.stabilization.drift, 28);
        assert_eq!(config.protocol.stabilization.death, 90);
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = TetraConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_day_floor() {
        let mut config = TetraConfig::default();
        config.protocol.stabilization.temporary = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temporary"));
    }

    #[test]
    fn test_validation_empty_state_file() {
        let mut config = TetraConfig::default();
        config.storage.state_file = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(TetraConfig::default().validate().is_ok());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = TetraConfig::default();
        config.expand_paths();
        assert!(!config.storage.state_file.contains('~'));
    }

    #[test]
    fn test_default_file_matches_defaults() {
        let parsed: TetraConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(parsed, TetraConfig::default());
    }

    #[test]
    fn test_partial_stabilization_table() {
        let config: TetraConfig = toml::from_str(
            r#"
[protocol.stabilization]
death = 120
"#,
        )
        .unwrap();
        assert_eq!(config.protocol.stabilization.death, 120);
        assert_eq!(config.protocol.stabilization.temporary, 7);
    }

    #[test]
    fn test_build_protocol_uses_policy() {
        let mut config = TetraConfig::default();
        config.protocol.stabilization.drift = 3;
        assert_eq!(config.build_protocol().policy().drift, 3);
    }
}
