//! Session configuration
//!
//! The CLI merges flags, environment and the optional config file into a
//! single [`SessionConfig`]; the access layer only ever sees the resolved
//! value. Config file location: `$S6CMD_CONFIG`, or
//! `<config dir>/s6cmd/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "S6CMD_CONFIG";

pub const MIB: u64 = 1024 * 1024;

/// Service limit on keys returned per list page
pub const MAX_PAGE_SIZE: i32 = 1000;

/// Retry policy for transient failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

/// Upload strategy tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Payloads of at least this many bytes use multipart upload
    pub multipart_threshold: u64,
    /// Size of each multipart part
    pub part_size: u64,
    /// Parts in flight at once
    pub concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: 10 * MIB,
            part_size: 10 * MIB,
            concurrency: 5,
        }
    }
}

/// Post-mutation confirmation polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl WaitConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            timeout_ms: 60_000,
        }
    }
}

/// Static credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl Credentials {
    /// Read credentials from the environment
    ///
    /// `OSS_ACCESS_KEY_ID`/`OSS_ACCESS_KEY_SECRET`/`OSS_SESSION_TOKEN` win over
    /// the `AWS_*` equivalents. Returns `None` when no key pair is set so the
    /// SDK's default provider chain can take over.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let pick = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .find(|value| !value.is_empty())
        };

        let access_key_id = pick(&["OSS_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"])?;
        let access_key_secret = pick(&["OSS_ACCESS_KEY_SECRET", "AWS_SECRET_ACCESS_KEY"])?;
        let session_token = pick(&["OSS_SESSION_TOKEN", "AWS_SESSION_TOKEN"]);

        Some(Self {
            access_key_id,
            access_key_secret,
            session_token,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Fully resolved configuration for one client session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`)
    pub path_style: bool,
    pub profile: Option<String>,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
    pub page_size: i32,
    pub retry: RetryConfig,
    pub transfer: TransferConfig,
    pub wait: WaitConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            path_style: false,
            profile: None,
            credentials: None,
            page_size: MAX_PAGE_SIZE,
            retry: RetryConfig::default(),
            transfer: TransferConfig::default(),
            wait: WaitConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Reject values that would make the engines misbehave
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("invalid endpoint '{endpoint}': {e}")))?;
        }
        if self.transfer.part_size < 5 * MIB {
            return Err(Error::Config(format!(
                "part size must be at least 5 MiB, got {} bytes",
                self.transfer.part_size
            )));
        }
        if self.transfer.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        if self.wait.interval_ms == 0 {
            return Err(Error::Config("wait interval must be positive".into()));
        }
        Ok(())
    }

    /// Page size clamped to the service limit
    pub fn effective_page_size(&self) -> i32 {
        clamp_page_size(self.page_size)
    }
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`
///
/// Non-positive values fall back to the maximum.
pub fn clamp_page_size(requested: i32) -> i32 {
    if requested <= 0 {
        MAX_PAGE_SIZE
    } else {
        requested.min(MAX_PAGE_SIZE)
    }
}

/// Loads the optional TOML config file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Locate the config file from `$S6CMD_CONFIG` or the platform config dir
    pub fn new() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Ok(Self::with_path(path));
        }

        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
        Ok(Self::with_path(dir.join("s6cmd").join("config.toml")))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file, or defaults when it does not exist
    pub fn load(&self) -> Result<SessionConfig> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No config file, using defaults");
                Ok(SessionConfig::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
