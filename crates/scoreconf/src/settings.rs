//! Configuration sections and their compiled defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn home_or_relative(relative: &str) -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(relative))
        .unwrap_or_else(|| PathBuf::from(relative))
}

/// Where files, stored objects and cached results live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory that relative file references resolve against.
    /// Default: ./uploads
    #[serde(default = "PathsConfig::default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Content-addressable storage directory.
    /// Default: ~/.smartscore/cas
    #[serde(default = "PathsConfig::default_cas_dir")]
    pub cas_dir: PathBuf,

    /// SQLite result cache.
    /// Default: ~/.smartscore/cache.db
    #[serde(default = "PathsConfig::default_cache_db")]
    pub cache_db: PathBuf,
}

impl PathsConfig {
    fn default_uploads_dir() -> PathBuf {
        PathBuf::from("uploads")
    }

    fn default_cas_dir() -> PathBuf {
        home_or_relative(".smartscore/cas")
    }

    fn default_cache_db() -> PathBuf {
        home_or_relative(".smartscore/cache.db")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            uploads_dir: Self::default_uploads_dir(),
            cas_dir: Self::default_cas_dir(),
            cache_db: Self::default_cache_db(),
        }
    }
}

/// Request defaults and batch parallelism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Category used when a request names none.
    /// Default: all
    #[serde(default = "AnalysisConfig::default_selector")]
    pub default_category: String,

    /// Granularity used when a request names none.
    /// Default: all
    #[serde(default = "AnalysisConfig::default_selector")]
    pub default_mode: String,

    /// Batch worker threads; 0 uses every core.
    #[serde(default)]
    pub worker_threads: usize,
}

impl AnalysisConfig {
    fn default_selector() -> String {
        "all".to_string()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_category: Self::default_selector(),
            default_mode: Self::default_selector(),
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive.
    /// Default: info
    #[serde(default = "LoggingConfig::default_log_level")]
    pub log_level: String,
}

impl LoggingConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
