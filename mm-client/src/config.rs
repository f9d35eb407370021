//! Client configuration
//!
//! Resolves the bootstrap settings from `mm_common::config` into typed
//! values: command line, then environment, then TOML file, then compiled
//! defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mm_common::config::{
    resolve_setting, CompiledDefaults, TomlConfig, ENV_OUTPUT_DIR, ENV_POLL_INTERVAL_MS,
    ENV_SERVER_URL,
};
use reqwest::Url;
use tracing::debug;

use crate::api::parse_base_url;
use crate::error::{Error, Result};
use crate::job::PollPolicy;

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

/// Fully resolved client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub poll: PollPolicy,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
}

impl ClientConfig {
    /// Load the TOML file (explicit path, `MM_CONFIG`, or the platform
    /// default) and resolve every setting
    pub fn load(overrides: &ConfigOverrides, config_file: Option<&Path>) -> Result<Self> {
        let toml = TomlConfig::load_or_default(config_file)?;
        Self::resolve(overrides, &toml)
    }

    pub fn resolve(overrides: &ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::default();

        let server_url = resolve_setting(
            overrides.server_url.clone(),
            ENV_SERVER_URL,
            toml.server_url.clone(),
            defaults.server_url,
        );
        let server_url = parse_base_url(&server_url)?;

        let poll_interval_ms = resolve_setting(
            overrides.poll_interval_ms,
            ENV_POLL_INTERVAL_MS,
            toml.poll_interval_ms,
            defaults.poll_interval_ms,
        );
        if poll_interval_ms == 0 {
            return Err(Error::Validation(
                "Poll interval must be greater than zero".to_string(),
            ));
        }

        let output_dir = resolve_setting(
            overrides.output_dir.clone(),
            ENV_OUTPUT_DIR,
            toml.output_dir.clone(),
            defaults.output_dir,
        );

        let poll = PollPolicy::new(
            Duration::from_millis(poll_interval_ms),
            toml.poll_max_retries.unwrap_or(defaults.poll_max_retries),
        );
        let request_timeout = Duration::from_secs(
            toml.request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs)
                .max(1),
        );
        let config = Self {
            server_url,
            poll,
            request_timeout,
            output_dir,
        };
        debug!(?config, "Resolved client configuration");
        Ok(config)
    }
}
