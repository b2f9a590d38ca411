// Configuration loading.
// TOML settings for the API endpoint, token and per-field cache TTLs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheTtls, default_cache_dir, default_config_path};
use crate::error::{RepoBarError, Result};
use crate::github::{GITHUB_API_BASE, StaticToken, TokenProvider};

/// Environment variable that overrides the configured token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST root, e.g. `https://github.example.com/api/v3` for Enterprise
    #[serde(default = "default_base_url")]
    pub base_url: String,

    pub token: Option<String>,
}

fn default_base_url() -> String {
    GITHUB_API_BASE.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Override for the detail cache base directory
    pub dir: Option<PathBuf>,

    #[serde(default = "default_open_pulls_ttl")]
    pub open_pulls_ttl_secs: u64,
    #[serde(default = "default_ci_status_ttl")]
    pub ci_status_ttl_secs: u64,
    #[serde(default = "default_activity_ttl")]
    pub activity_ttl_secs: u64,
    #[serde(default = "default_traffic_ttl")]
    pub traffic_ttl_secs: u64,
    #[serde(default = "default_heatmap_ttl")]
    pub heatmap_ttl_secs: u64,
    #[serde(default = "default_release_ttl")]
    pub release_ttl_secs: u64,
}

fn default_open_pulls_ttl() -> u64 {
    60
}

fn default_ci_status_ttl() -> u64 {
    60
}

fn default_activity_ttl() -> u64 {
    300
}

fn default_traffic_ttl() -> u64 {
    3600
}

fn default_heatmap_ttl() -> u64 {
    3600
}

fn default_release_ttl() -> u64 {
    1800
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            open_pulls_ttl_secs: default_open_pulls_ttl(),
            ci_status_ttl_secs: default_ci_status_ttl(),
            activity_ttl_secs: default_activity_ttl(),
            traffic_ttl_secs: default_traffic_ttl(),
            heatmap_ttl_secs: default_heatmap_ttl(),
            release_ttl_secs: default_release_ttl(),
        }
    }
}

fn ttl_from_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

impl Config {
    /// Load from `path`, or the platform config file when `None`, then apply `GITHUB_TOKEN`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => Self::default(),
            },
        };
        config.override_token(std::env::var(TOKEN_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Replace the configured token when `token` is non-empty.
    pub fn override_token(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.api.token = Some(token);
        }
    }

    /// The configured token, or an error when none is set.
    pub fn require_token(&self) -> Result<&str> {
        self.api
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(RepoBarError::MissingToken)
    }

    /// Token provider for the client. Without a token every request fails with `MissingToken`.
    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        Arc::new(StaticToken::new(self.require_token().unwrap_or_default()))
    }

    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            open_pulls: ttl_from_secs(self.cache.open_pulls_ttl_secs),
            ci_status: ttl_from_secs(self.cache.ci_status_ttl_secs),
            activity: ttl_from_secs(self.cache.activity_ttl_secs),
            traffic: ttl_from_secs(self.cache.traffic_ttl_secs),
            commit_heatmap: ttl_from_secs(self.cache.heatmap_ttl_secs),
            latest_release: ttl_from_secs(self.cache.release_ttl_secs),
        }
    }

    /// Detail cache base directory; `None` when no platform directory exists.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.dir.clone().or_else(default_cache_dir)
    }
}
