//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, SmartScoreConfig};
use std::env;
use std::path::{Path, PathBuf};

pub const SYSTEM_CONFIG: &str = "/etc/smartscore/config.toml";
pub const LOCAL_CONFIG: &str = "smartscore.toml";

/// Information about where config values came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only existing files
/// are returned. A CLI path replaces the local override.
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from(SYSTEM_CONFIG);
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("smartscore/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    match cli_path {
        Some(path) => files.push(path.to_path_buf()),
        None => {
            let local = PathBuf::from(LOCAL_CONFIG);
            if local.exists() {
                files.push(local);
            }
        }
    }

    files
}

/// Overlay one TOML file onto `config`. Keys the file omits are untouched.
pub fn apply_file(config: &mut SmartScoreConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    apply_toml(config, &contents, path)
}

pub(crate) fn apply_toml(
    config: &mut SmartScoreConfig,
    contents: &str,
    path: &Path,
) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let section = Section { table: &table, path };

    if let Some(paths) = section.child("paths")? {
        if let Some(v) = paths.string("uploads_dir")? {
            config.paths.uploads_dir = expand_path(v);
        }
        if let Some(v) = paths.string("cas_dir")? {
            config.paths.cas_dir = expand_path(v);
        }
        if let Some(v) = paths.string("cache_db")? {
            config.paths.cache_db = expand_path(v);
        }
    }

    if let Some(analysis) = section.child("analysis")? {
        if let Some(v) = analysis.string("default_category")? {
            config.analysis.default_category = v.to_string();
        }
        if let Some(v) = analysis.string("default_mode")? {
            config.analysis.default_mode = v.to_string();
        }
        if let Some(v) = analysis.count("worker_threads")? {
            config.analysis.worker_threads = v;
        }
    }

    if let Some(logging) = section.child("logging")? {
        if let Some(v) = logging.string("log_level")? {
            config.logging.log_level = v.to_string();
        }
    }

    Ok(())
}

/// A TOML table plus the file it came from, for error messages.
struct Section<'a> {
    table: &'a toml::Table,
    path: &'a Path,
}

impl<'a> Section<'a> {
    fn invalid(&self, key: &str, expected: &str) -> ConfigError {
        ConfigError::InvalidValue {
            path: self.path.to_path_buf(),
            key: key.to_string(),
            expected: expected.to_string(),
        }
    }

    fn child(&self, key: &str) -> Result<Option<Section<'a>>, ConfigError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_table()
                .map(|table| Some(Section { table, path: self.path }))
                .ok_or_else(|| self.invalid(key, "a table")),
        }
    }

    fn string(&self, key: &str) -> Result<Option<&'a str>, ConfigError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a string")),
        }
    }

    fn count(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_integer()
                .and_then(|v| usize::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a non-negative integer")),
        }
    }
}

/// Apply `SMARTSCORE_*` overrides from the process environment.
pub fn apply_env_overrides(config: &mut SmartScoreConfig, sources: &mut ConfigSources) {
    apply_env_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from any variable lookup.
pub fn apply_env_from(
    config: &mut SmartScoreConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let mut take = |key: &str| {
        let value = lookup(key).filter(|v| !v.trim().is_empty())?;
        sources.env_overrides.push(key.to_string());
        Some(value)
    };

    if let Some(v) = take("SMARTSCORE_UPLOADS_DIR") {
        config.paths.uploads_dir = expand_path(&v);
    }
    if let Some(v) = take("SMARTSCORE_CAS_DIR") {
        config.paths.cas_dir = expand_path(&v);
    }
    // Same variable the store itself honours
    if let Some(v) = take("SMARTSCORE_CAS_PATH") {
        config.paths.cas_dir = expand_path(&v);
    }
    if let Some(v) = take("SMARTSCORE_CACHE_DB") {
        config.paths.cache_db = expand_path(&v);
    }
    if let Some(v) = take("SMARTSCORE_DEFAULT_CATEGORY") {
        config.analysis.default_category = v;
    }
    if let Some(v) = take("SMARTSCORE_DEFAULT_MODE") {
        config.analysis.default_mode = v;
    }
    if let Some(v) = take("SMARTSCORE_WORKER_THREADS") {
        if let Ok(threads) = v.trim().parse() {
            config.analysis.worker_threads = threads;
        }
    }
    if let Some(v) = take("SMARTSCORE_LOG_LEVEL") {
        config.logging.log_level = v;
    }
    // Also support RUST_LOG
    if let Some(v) = take("RUST_LOG") {
        config.logging.log_level = v;
    }
}

/// Expand `~/` and a leading `$VAR` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        return directories::BaseDirs::new()
            .map(|d| d.home_dir().join(stripped))
            .unwrap_or_else(|| PathBuf::from(path));
    }

    if let Some(stripped) = path.strip_prefix('$') {
        let (var_name, rest) = match stripped.split_once('/') {
            Some((name, rest)) => (name, Some(rest)),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn parse(toml: &str) -> Result<SmartScoreConfig, ConfigError> {
        let mut config = SmartScoreConfig::default();
        apply_toml(&mut config, toml, Path::new("test.toml"))?;
        Ok(config)
    }

    #[test]
    fn expand_path_tilde() {
        let expanded = expand_path("~/scores/in");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("scores/in"));
    }

    #[test]
    fn expand_path_absolute() {
        assert_eq!(expand_path("/srv/uploads"), PathBuf::from("/srv/uploads"));
    }

    #[test]
    fn expand_path_unknown_variable_is_literal() {
        assert_eq!(
            expand_path("$SMARTSCORE_SURELY_UNSET_VAR/x"),
            PathBuf::from("$SMARTSCORE_SURELY_UNSET_VAR/x")
        );
    }

    #[test]
    fn minimal_file_keeps_other_defaults() {
        let config = parse("[paths]\nuploads_dir = \"/srv/uploads\"\n").unwrap();
        assert_eq!(config.paths.uploads_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.paths.cas_dir, SmartScoreConfig::default().paths.cas_dir);
        assert_eq!(config.analysis.default_mode, "all");
    }

    #[test]
    fn full_file() {
        let config = parse(
            r#"
[paths]
uploads_dir = "/data/uploads"
cas_dir = "/data/cas"
cache_db = "/data/cache.db"

[analysis]
default_category = "melodic"
default_mode = "global"
worker_threads = 4

[logging]
log_level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.paths.cas_dir, PathBuf::from("/data/cas"));
        assert_eq!(config.paths.cache_db, PathBuf::from("/data/cache.db"));
        assert_eq!(config.analysis.default_category, "melodic");
        assert_eq!(config.analysis.default_mode, "global");
        assert_eq!(config.analysis.worker_threads, 4);
        assert_eq!(config.logging.log_level, "debug");
    }

    #[test]
    fn later_files_only_override_what_they_set() {
        let mut config = SmartScoreConfig::default();
        apply_toml(&mut config, "[analysis]\nworker_threads = 2\n", Path::new("a.toml")).unwrap();
        apply_toml(&mut config, "[logging]\nlog_level = \"warn\"\n", Path::new("b.toml")).unwrap();
        assert_eq!(config.analysis.worker_threads, 2);
        assert_eq!(config.logging.log_level, "warn");
    }

    #[test]
    fn wrong_types_are_reported() {
        let err = parse("[analysis]\nworker_threads = -1\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "worker_threads"));

        let err = parse("paths = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "paths"));

        assert!(matches!(parse("[paths"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn env_overrides_win_and_are_recorded() {
        let vars: HashMap<&str, &str> = [
            ("SMARTSCORE_CAS_DIR", "/env/cas"),
            ("SMARTSCORE_WORKER_THREADS", "8"),
            ("SMARTSCORE_DEFAULT_CATEGORY", "harmonic"),
            ("SMARTSCORE_LOG_LEVEL", " "),
        ]
        .into_iter()
        .collect();

        let mut config = SmartScoreConfig::default();
        let mut sources = ConfigSources::default();
        apply_env_from(&mut config, &mut sources, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.paths.cas_dir, PathBuf::from("/env/cas"));
        assert_eq!(config.analysis.worker_threads, 8);
        assert_eq!(config.analysis.default_category, "harmonic");
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(
            sources.env_overrides,
            ["SMARTSCORE_CAS_DIR", "SMARTSCORE_DEFAULT_CATEGORY", "SMARTSCORE_WORKER_THREADS"]
        );
    }
}
