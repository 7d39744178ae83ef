//! Configuration management for scanrecorder.
//!
//! Configuration loading and validation using figment, supporting TOML
//! config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "scanrecorder";

/// Subdirectory of the data directory holding recordings and archives.
const RECORDINGS_DIR_NAME: &str = "recordings";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables, prefixed with `SCANRECORDER_` and using `__`
///    between section and field (field names contain `_` themselves), e.g.
///    `SCANRECORDER_STORAGE__FILE_PREFIX`
/// 2. TOML config file at `~/.config/scanrecorder/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Capture configuration.
    pub capture: CaptureConfig,
    /// Worker pool configuration.
    pub workers: WorkerConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory receiving frame files, trajectory files and archives.
    /// Defaults to `~/.local/share/scanrecorder/recordings`.
    pub recordings_dir: Option<PathBuf>,
    /// Filename prefix for frame and trajectory files.
    pub file_prefix: String,
    /// Filename prefix for session archives.
    pub archive_prefix: String,
}

/// Capture-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Whether auto mode (1-in-3 subsampled continuous capture) starts
    /// enabled.
    pub auto_mode: bool,
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker tasks performing disk writes and archiving.
    pub count: usize,
    /// Capacity of the job queue feeding the workers. When full, further
    /// frame captures are dropped (logged) rather than blocking the
    /// sensor callback.
    pub queue_depth: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recordings_dir: None, // Will be resolved to default at runtime
            file_prefix: "pc".to_string(),
            archive_prefix: "scan".to_string(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { auto_mode: false }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 2,
            queue_depth: 32,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("SCANRECORDER_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        for (name, prefix) in [
            ("file_prefix", &self.storage.file_prefix),
            ("archive_prefix", &self.storage.archive_prefix),
        ] {
            if prefix.is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must not be empty"),
                });
            }
            if prefix.contains(['/', '\\']) || prefix.contains("..") {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must not contain path separators: {prefix:?}"),
                });
            }
        }

        if self.workers.count == 0 {
            return Err(Error::ConfigValidation {
                message: "workers.count must be at least 1".to_string(),
            });
        }

        if self.workers.queue_depth == 0 {
            return Err(Error::ConfigValidation {
                message: "workers.queue_depth must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Get the recordings directory, resolving defaults if not set.
    #[must_use]
    pub fn recordings_dir(&self) -> PathBuf {
        self.storage
            .recordings_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(RECORDINGS_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.recordings_dir.is_none());
        assert_eq!(config.storage.file_prefix, "pc");
        assert_eq!(config.storage.archive_prefix, "scan");
        assert!(!config.capture.auto_mode);
        assert_eq!(config.workers.count, 2);
        assert_eq!(config.workers.queue_depth, 32);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_prefix() {
        let mut config = Config::default();
        config.storage.file_prefix = String::new();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("file_prefix"));
    }

    #[test]
    fn test_validate_prefix_with_separator() {
        let mut config = Config::default();
        config.storage.archive_prefix = "../escape".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("archive_prefix"));
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = Config::default();
        config.workers.count = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("workers.count"));
    }

    #[test]
    fn test_validate_zero_queue_depth() {
        let mut config = Config::default();
        config.workers.queue_depth = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("queue_depth"));
    }

    #[test]
    fn test_recordings_dir_default() {
        let config = Config::default();
        let dir = config.recordings_dir();
        assert!(dir.to_string_lossy().contains("scanrecorder"));
        assert!(dir.to_string_lossy().contains("recordings"));
    }

    #[test]
    fn test_recordings_dir_custom() {
        let mut config = Config::default();
        config.storage.recordings_dir = Some(PathBuf::from("/data/scans"));
        assert_eq!(config.recordings_dir(), PathBuf::from("/data/scans"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("scanrecorder"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        figment::Jail::expect_with(|_jail| {
            let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
            assert!(result.is_ok());
            assert_eq!(result.unwrap(), Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_multiword_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SCANRECORDER_STORAGE__FILE_PREFIX", "cloud");
            jail.set_env("SCANRECORDER_STORAGE__RECORDINGS_DIR", "/data/scans");
            jail.set_env("SCANRECORDER_CAPTURE__AUTO_MODE", "true");
            jail.set_env("SCANRECORDER_WORKERS__QUEUE_DEPTH", "8");

            let config =
                Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
            assert_eq!(config.storage.file_prefix, "cloud");
            assert_eq!(
                config.storage.recordings_dir,
                Some(PathBuf::from("/data/scans"))
            );
            assert!(config.capture.auto_mode);
            assert_eq!(config.workers.queue_depth, 8);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_single_word_key() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SCANRECORDER_WORKERS__COUNT", "4");
            let config =
                Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
            assert_eq!(config.workers.count, 4);
            Ok(())
        });
    }

    #[test]
    fn test_config_serialize_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
