//! Where the store lives and whether it may be written.
//!
//! `SMARTSCORE_CAS_PATH` overrides the base path and
//! `SMARTSCORE_CAS_READONLY=true` opens it read-only.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const PATH_VAR: &str = "SMARTSCORE_CAS_PATH";
pub const READONLY_VAR: &str = "SMARTSCORE_CAS_READONLY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasConfig {
    /// Objects go under `objects/`, sidecar metadata under `metadata/`.
    pub base_path: PathBuf,

    #[serde(default = "default_true")]
    pub store_metadata: bool,

    #[serde(default)]
    pub read_only: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CasConfig {
    fn default() -> Self {
        Self::with_base_path(default_cas_path())
    }
}

/// `~/.smartscore/cas`, or a relative fallback when there is no home directory.
pub fn default_cas_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".smartscore").join("cas"))
        .unwrap_or_else(|| PathBuf::from(".smartscore/cas"))
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl CasConfig {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Self {
        let mut config = match env::var(PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::with_base_path(path),
            _ => Self::default(),
        };
        if let Ok(value) = env::var(READONLY_VAR) {
            config.read_only = truthy(&value);
        }
        config
    }

    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            store_metadata: true,
            read_only: false,
        }
    }

    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            store_metadata: false,
            read_only: true,
        }
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.base_path.join("metadata")
    }
}
