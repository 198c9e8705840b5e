//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use sr_core::RoundPolicy;

use crate::commands::util::parse_duration;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Default rounding granularity for replays (e.g., "15m").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<String>,

    /// Rows fetched per query when iterating the event log.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

const fn default_page_size() -> usize {
    sr_db::DEFAULT_PAGE_SIZE
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("round", &self.round)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("sr.db"),
            round: None,
            page_size: default_page_size(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SR_*)
        figment = figment.merge(Env::prefixed("SR_"));

        figment.extract()
    }

    /// Parses the configured default rounding granularity.
    pub fn round_policy(&self) -> anyhow::Result<Option<RoundPolicy>> {
        self.round
            .as_deref()
            .map(|round| Ok(RoundPolicy::new(parse_duration(round)?)?))
            .transpose()
    }
}

/// Returns the platform-specific config directory for sr.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sr"))
}

/// Returns the platform-specific data directory for sr.
///
/// On Linux: `~/.local/share/sr`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("sr"))
}
