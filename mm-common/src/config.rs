//! Bootstrap configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and the compiled
//! defaults apply.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the backend base URL
pub const ENV_SERVER_URL: &str = "MM_SERVER_URL";
/// Environment variable overriding the poll interval (milliseconds)
pub const ENV_POLL_INTERVAL_MS: &str = "MM_POLL_INTERVAL_MS";
/// Environment variable overriding the download directory
pub const ENV_OUTPUT_DIR: &str = "MM_OUTPUT_DIR";
/// Environment variable pointing at an alternative TOML file
pub const ENV_CONFIG_FILE: &str = "MM_CONFIG";

/// Compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub poll_max_retries: u32,
    pub request_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            poll_interval_ms: 2000,
            poll_max_retries: 3,
            request_timeout_secs: 30,
            output_dir: PathBuf::from("mastered"),
            log_level: "info".to_string(),
        }
    }
}

/// Configuration loaded from TOML file
///
/// Every field is optional; unset fields fall through to the compiled
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Backend base URL, e.g. `http://localhost:8000`
    #[serde(default)]
    pub server_url: Option<String>,

    /// Delay between job status polls
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    /// Consecutive poll transport failures tolerated before the job is failed
    #[serde(default)]
    pub poll_max_retries: Option<u32>,

    /// Per-request HTTP timeout
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Where downloaded renditions are written
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Log level from `[logging]`, or the compiled default
    pub fn log_level(&self) -> String {
        self.logging
            .level
            .clone()
            .unwrap_or_else(|| CompiledDefaults::default().log_level)
    }

    /// Load from `path`, or from the default location when `path` is `None`
    ///
    /// Missing files yield an empty config (all defaults) with a warning;
    /// unreadable or malformed files are errors.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let source = ConfigSource::locate(path);
        source.log();
        Self::load_from(&source)
    }

    /// Load whatever `source` points at without logging
    ///
    /// For callers that read the config before tracing is installed and
    /// report the source afterwards with [`ConfigSource::log`].
    pub fn load_from(source: &ConfigSource) -> Result<Self> {
        match source {
            ConfigSource::File(path) => Self::load(path),
            ConfigSource::Missing(_) | ConfigSource::NoConfigDir => Ok(Self::default()),
        }
    }
}

/// Where the TOML configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// An existing file
    File(PathBuf),
    /// Candidate path that does not exist; defaults apply
    Missing(PathBuf),
    /// No explicit path and no platform config directory
    NoConfigDir,
}

impl ConfigSource {
    /// Explicit `path`, then `MM_CONFIG`, then the platform default
    pub fn locate(path: Option<&Path>) -> Self {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var(ENV_CONFIG_FILE)
                .ok()
                .map(PathBuf::from)
                .or_else(default_config_path),
        };

        match candidate {
            Some(p) if p.exists() => ConfigSource::File(p),
            Some(p) => ConfigSource::Missing(p),
            None => ConfigSource::NoConfigDir,
        }
    }

    pub fn log(&self) {
        match self {
            ConfigSource::File(p) => debug!("Loading configuration from {}", p.display()),
            ConfigSource::Missing(p) => {
                warn!("Config file {} not found, using defaults", p.display())
            }
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using defaults")
            }
        }
    }
}

/// Default configuration file path for the platform
///
/// `~/.config/matchmaster/config.toml` on Linux, the platform equivalent
/// elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("matchmaster").join("config.toml"))
}

/// Resolve one setting through CLI → ENV → TOML → default
///
/// Environment values that fail to parse are ignored with a warning.
pub fn resolve_setting<T>(
    cli: Option<T>,
    env_var_name: &str,
    toml_value: Option<T>,
    default: T,
) -> T
where
    T: std::str::FromStr,
{
    if let Some(value) = cli {
        return value;
    }

    if let Ok(raw) = std::env::var(env_var_name) {
        match raw.parse::<T>() {
            Ok(value) => return value,
            Err(_) => warn!("Ignoring unparsable {}={:?}", env_var_name, raw),
        }
    }

    toml_value.unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = TomlConfig::parse(
            r#"
            server_url = "http://mastering.local:9000"
            poll_interval_ms = 500
            poll_max_retries = 0
            output_dir = "/tmp/out"

            [logging]
            level = "debug"
            "#,
        )
        .expect("valid TOML");

        assert_eq!(config.server_url.as_deref(), Some("http://mastering.local:9000"));
        assert_eq!(config.poll_interval_ms, Some(500));
        assert_eq!(config.poll_max_retries, Some(0));
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert!(config.request_timeout_secs.is_none());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = TomlConfig::parse("").expect("empty TOML is valid");
        assert!(config.server_url.is_none());
        assert!(config.logging.level.is_none());
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_compiled_defaults() {
        let defaults = CompiledDefaults::default();
        assert_eq!(defaults.server_url, "http://localhost:8000");
        assert_eq!(defaults.poll_interval_ms, 2000);
        assert_eq!(defaults.poll_max_retries, 3);
    }
}
