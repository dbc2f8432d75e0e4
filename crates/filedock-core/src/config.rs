use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "FILEDOCK_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "FILEDOCK_TIMEOUT_SECS";
pub const ENV_SESSION_STORE: &str = "FILEDOCK_SESSION_STORE";
pub const ENV_DATA_DIR: &str = "FILEDOCK_DATA_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    Keyring,
    File,
    Memory,
}

impl std::str::FromStr for SessionStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!(
                "unknown session store {other:?} (expected keyring, file or memory)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub session_store: SessionStoreKind,
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_store: SessionStoreKind::File,
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Defaults, then the config file, then the process environment,
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::layered(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Same layering as [`ClientConfig::load`] without validation, for callers
    /// that override fields afterwards and validate once at the end.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn layered(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match paths::config_file() {
                Ok(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| anyhow!("{ENV_TIMEOUT_SECS} must be a whole number of seconds"))?;
        }
        if let Some(kind) = lookup(ENV_SESSION_STORE) {
            self.session_store = kind.parse()?;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/').to_string();
        let url = reqwest::Url::parse(&trimmed)
            .map_err(|e| anyhow!("invalid api base url {trimmed:?}: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("api base url must be http or https, got {}", url.scheme()));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request timeout must be at least one second"));
        }
        self.api_base_url = trimmed;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::data_dir(),
        }
    }
}
