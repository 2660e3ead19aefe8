//! Layered configuration for ldata.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults,
//! 2. the user config file (`$XDG_CONFIG_HOME/ldata/config.toml` on Linux),
//! 3. an explicitly named TOML file,
//! 4. `LDATA_*` environment variables, with `__` separating sections
//!    (`LDATA_TRANSFER__WORKERS=8`).
//!
//! If no layer sets `api.token`, the `LATCH_TOKEN` environment variable and
//! then `~/.latch/token` are tried, so existing Latch logins keep working.
//!
//! # Examples
//!
//! ```no_run
//! use ldata_config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! println!("{} workers against {}", config.transfer.workers, config.api.url);
//! # Ok(())
//! # }
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::{BaseDirs, ProjectDirs};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use ldata_progress::ProgressMode;
use ldata_transfer::{MIN_PART_SIZE, TransferConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "LDATA_";
pub const TOKEN_ENV: &str = "LATCH_TOKEN";

/// Control-plane connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub token: Option<String>,
    /// Per-request timeout for the control plane; for object storage, the
    /// connect and per-read timeout.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "https://nucleus.latch.bio".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Minimum milliseconds between two redraws.
    pub refresh_ms: u64,
    pub mode: ProgressMode,
}

impl ProgressConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 100,
            mode: ProgressMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub transfer: TransferConfig,
    pub progress: ProgressConfig,
}

impl Config {
    /// Load from every source and validate the result.
    ///
    /// `explicit` must exist if given; the user config file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        Self::load_from(user_config_path().as_deref(), explicit, home.as_deref())
    }

    fn load_from(user: Option<&Path>, explicit: Option<&Path>, home: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit
            && !path.is_file()
        {
            exn::bail!(ErrorKind::MissingFile(path.to_path_buf()));
        }
        let mut config: Self = Self::figment(user, explicit).extract().or_raise(|| ErrorKind::Load)?;
        if config.api.token.is_none() {
            config.api.token = fallback_token(home);
        }
        config.validate()?;
        tracing::debug!(
            api = %config.api.url,
            workers = config.transfer.workers,
            authenticated = config.api.token.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// The merged, unvalidated sources.
    pub fn figment(user: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = user {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file_exact(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject values the transfer engines cannot work with.
    pub fn validate(&self) -> Result<()> {
        let transfer = &self.transfer;
        if transfer.workers == 0 {
            exn::bail!(ErrorKind::Invalid("transfer.workers must be at least 1".to_string()));
        }
        if transfer.chunk_size == 0 {
            exn::bail!(ErrorKind::Invalid("transfer.chunk_size must be at least 1".to_string()));
        }
        if transfer.part_size < MIN_PART_SIZE {
            exn::bail!(ErrorKind::Invalid(format!(
                "transfer.part_size must be at least {MIN_PART_SIZE} bytes"
            )));
        }
        if transfer.max_slots == Some(0) {
            tracing::warn!("transfer.max_slots is 0, per-file progress bars are disabled");
        }
        if self.api.url.is_empty() {
            exn::bail!(ErrorKind::Invalid("api.url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// `config.toml` in the platform's config directory for ldata.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("bio", "latch", "ldata").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn fallback_token(home: Option<&Path>) -> Option<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV)
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }
    let path = home?.join(".latch").join("token");
    match std::fs::read_to_string(&path) {
        Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "could not read token file");
            }
            None
        },
    }
}
