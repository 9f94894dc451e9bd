//! Configuration loading and management
//!
//! Configuration is loaded from `<data_dir>/config.toml`, where the data
//! directory is `$SPAM_DATA_DIR` or `~/.claude/spam`.
//!
//! Everything SPAM persists lives under the data directory:
//! - `catalog.json` - the catalog snapshot
//! - `activations.sqlite` - the activation store
//! - `logs/` - rolling log files

use crate::catalog::ScanRoots;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SPAM_DATA_DIR";

/// Environment variable the host sets to the active project root.
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

/// Environment variable overriding the transcript directory.
pub const TRANSCRIPT_DIR_ENV: &str = "SPAM_TRANSCRIPT_DIR";

/// Returns a best-effort home directory path.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Expand a leading `~` against the given home directory.
pub(crate) fn expand_home(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Filesystem overrides
    #[serde(default)]
    pub paths: PathOverrides,

    /// Activation store tuning
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Override paths for host directories
#[derive(Debug, Deserialize, Default)]
pub struct PathOverrides {
    /// Host home directory (default `~/.claude`)
    pub claude_home: Option<PathBuf>,
    /// Project root, used when `CLAUDE_PROJECT_DIR` is not set
    pub project_dir: Option<PathBuf>,
    /// Plugin directory (default `<claude_home>/plugins`)
    pub plugins_dir: Option<PathBuf>,
    /// Transcript directory (default `<claude_home>/projects`)
    pub transcript_dir: Option<PathBuf>,
}

/// Activation store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// How long a writer waits on a locked database before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_busy_timeout_ms() -> u64 {
    500
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the data directory path
    ///
    /// `$SPAM_DATA_DIR` or `~/.claude/spam/`
    pub fn data_dir() -> PathBuf {
        std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| home_dir().join(".claude").join("spam"))
    }

    /// Returns the default config file path
    pub fn config_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Returns the catalog snapshot path
    pub fn catalog_path() -> PathBuf {
        Self::data_dir().join("catalog.json")
    }

    /// Returns the activation database path
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("activations.sqlite")
    }

    /// Returns the log directory path
    pub fn log_dir() -> PathBuf {
        Self::data_dir().join("logs")
    }

    /// Returns the host home directory (`~/.claude` unless overridden)
    pub fn claude_home(&self) -> PathBuf {
        self.paths
            .claude_home
            .as_deref()
            .map(expand_override)
            .unwrap_or_else(|| home_dir().join(".claude"))
    }

    /// Returns the project root, preferring `$CLAUDE_PROJECT_DIR`
    pub fn project_dir(&self) -> Option<PathBuf> {
        std::env::var_os(PROJECT_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.paths.project_dir.as_deref().map(expand_override))
    }

    /// Returns the transcript root, preferring `$SPAM_TRANSCRIPT_DIR`
    pub fn transcript_dir(&self) -> PathBuf {
        std::env::var_os(TRANSCRIPT_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.paths.transcript_dir.as_deref().map(expand_override))
            .unwrap_or_else(|| self.claude_home().join("projects"))
    }

    /// Build the scan roots for the catalog builder from this config and
    /// the process environment.
    pub fn scan_roots(&self) -> ScanRoots {
        let claude_home = self.claude_home();
        let plugins_dir = self
            .paths
            .plugins_dir
            .as_deref()
            .map(expand_override)
            .unwrap_or_else(|| claude_home.join("plugins"));

        ScanRoots {
            home: home_dir(),
            claude_home,
            project_dir: self.project_dir(),
            plugins_dir,
        }
    }
}

/// Config file paths may start with `~`.
fn expand_override(path: &Path) -> PathBuf {
    expand_home(&path.to_string_lossy(), &home_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.busy_timeout_ms, 500);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.max_files, 5);
        assert!(config.paths.claude_home.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[paths]
claude_home = "/tmp/claude"
transcript_dir = "/tmp/transcripts"

[store]
busy_timeout_ms = 250

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.claude_home(), PathBuf::from("/tmp/claude"));
        assert_eq!(config.store.busy_timeout_ms, 250);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.max_files, 5);
    }

    #[test]
    fn test_scan_roots_derive_plugins_dir() {
        let config: Config = toml::from_str(
            r#"
[paths]
claude_home = "/tmp/claude"
"#,
        )
        .unwrap();

        let roots = config.scan_roots();
        assert_eq!(roots.claude_home, PathBuf::from("/tmp/claude"));
        assert_eq!(roots.plugins_dir, PathBuf::from("/tmp/claude/plugins"));
    }

    #[test]
    fn test_expand_home() {
        let home = Path::new("/home/dev");
        assert_eq!(expand_home("~", home), PathBuf::from("/home/dev"));
        assert_eq!(
            expand_home("~/plugins/x", home),
            PathBuf::from("/home/dev/plugins/x")
        );
        assert_eq!(expand_home("/abs/path", home), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_load_from_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store\nbusy_timeout_ms = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
