//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution
//! order:
//! 1. explicit path (e.g. from a `--config` flag in the embedding binary)
//! 2. `~/.bifrost/config.toml` (user)
//! 3. `/etc/bifrost/config.toml` (system)
//!
//! Every tunable has a serde default, so a minimal file only names the
//! providers. Backend adapters are code, not config: they are registered
//! on the builder and matched to `[[providers]]` entries by id.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::classify::ClassifierConfig;
use crate::providers::HealthPolicy;
use crate::routing::ScoringWeights;
use crate::types::RiskTier;
use crate::{BifrostError, Result};

/// Serde helper: durations appear in config as integer seconds.
pub(crate) mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Declared provider attributes; one entry per registered adapter.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub health: HealthPolicy,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Declared attributes of one backend, loaded at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Stable provider id; must match a registered adapter.
    pub id: String,
    /// Cost per unit of work. Must be positive.
    pub cost_per_unit: f64,
    /// Compliance tags this provider satisfies.
    #[serde(default)]
    pub compliance_tags: Vec<String>,
    /// Highest risk tier this provider may serve. Defaults to low, the
    /// conservative reading of an unspecified ceiling.
    #[serde(default)]
    pub risk_ceiling: RiskTier,
}

/// Timeout bounds for dispatching.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Timeout for a single dispatch attempt. Default: 30 s.
    #[serde(
        default = "default_attempt_timeout",
        rename = "attempt_timeout_secs",
        with = "serde_secs"
    )]
    pub attempt_timeout: Duration,
    /// Overall per-request deadline bounding the whole fallback cascade.
    /// Default: 120 s.
    #[serde(
        default = "default_request_deadline",
        rename = "request_deadline_secs",
        with = "serde_secs"
    )]
    pub request_deadline: Duration,
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_request_deadline() -> Duration {
    Duration::from_secs(120)
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: default_attempt_timeout(),
            request_deadline: default_request_deadline(),
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            BifrostError::Configuration(format!("failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BifrostError::Configuration(format!("failed to parse config: {e}")))
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(BifrostError::Configuration(format!(
                "config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".bifrost").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/bifrost/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(BifrostError::Configuration(
            "no config file found. Create ~/.bifrost/config.toml or /etc/bifrost/config.toml"
                .to_string(),
        ))
    }
}
