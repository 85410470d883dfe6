//! Configuration loading for SmartScore.
//!
//! # Usage
//!
//! ```rust,no_run
//! use scoreconf::SmartScoreConfig;
//!
//! let config = SmartScoreConfig::load().expect("Failed to load config");
//! println!("CAS dir: {}", config.paths.cas_dir.display());
//! println!("Workers: {}", config.analysis.worker_threads);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/smartscore/config.toml` (system)
//! 2. `~/.config/smartscore/config.toml` (user)
//! 3. `./smartscore.toml`, or the path given with `--config`
//! 4. Environment variables (`SMARTSCORE_*`, plus `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! uploads_dir = "~/scores"
//! cas_dir = "~/.smartscore/cas"
//! cache_db = "~/.smartscore/cache.db"
//!
//! [analysis]
//! default_category = "all"
//! default_mode = "global"
//! worker_threads = 0   # every core
//!
//! [logging]
//! log_level = "info"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files, expand_path, ConfigSources};
pub use settings::{AnalysisConfig, LoggingConfig, PathsConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for '{key}' in {path}: expected {expected}")]
    InvalidValue {
        path: PathBuf,
        key: String,
        expected: String,
    },
}

/// Complete SmartScore configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartScoreConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SmartScoreConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with an explicit file in place of `./smartscore.toml`.
    ///
    /// Unlike the discovered files, an explicit path must exist.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = SmartScoreConfig::default();

        for path in loader::discover_config_files(config_path) {
            loader::apply_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Render as TOML, in the same layout the loader reads.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# SmartScore Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "uploads_dir = \"{}\"\n",
            self.paths.uploads_dir.display()
        ));
        output.push_str(&format!("cas_dir = \"{}\"\n", self.paths.cas_dir.display()));
        output.push_str(&format!("cache_db = \"{}\"\n", self.paths.cache_db.display()));

        output.push_str("\n[analysis]\n");
        output.push_str(&format!(
            "default_category = \"{}\"\n",
            self.analysis.default_category
        ));
        output.push_str(&format!("default_mode = \"{}\"\n", self.analysis.default_mode));
        output.push_str(&format!("worker_threads = {}\n", self.analysis.worker_threads));

        output.push_str("\n[logging]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.logging.log_level));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn to_toml_has_every_section() {
        let toml = SmartScoreConfig::default().to_toml();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[analysis]"));
        assert!(toml.contains("[logging]"));
        assert!(toml.contains("worker_threads = 0"));
    }

    #[test]
    fn to_toml_reads_back() {
        let mut config = SmartScoreConfig::default();
        config.paths.uploads_dir = PathBuf::from("/srv/uploads");
        config.analysis.worker_threads = 3;
        config.logging.log_level = "smartscore=debug".into();

        let mut restored = SmartScoreConfig::default();
        loader::apply_toml(&mut restored, &config.to_toml(), Path::new("rendered.toml")).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[analysis]\ndefault_mode = \"per_measure\"\n").unwrap();

        let (config, sources) = SmartScoreConfig::load_with_sources_from(Some(&path)).unwrap();
        assert_eq!(sources.files.last(), Some(&path));
        if std::env::var("SMARTSCORE_DEFAULT_MODE").is_err() {
            assert_eq!(config.analysis.default_mode, "per_measure");
        }
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = SmartScoreConfig::load_from(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
