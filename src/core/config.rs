//! Engine configuration
//!
//! Resolution order, later wins:
//! 1. built-in defaults
//! 2. `$XDG_CONFIG_HOME/provision/config.toml` (or an explicit `--config` file)
//! 3. environment (`PROVISION_HTTP_TIMEOUT`, `PROVISION_GITHUB_API`,
//!    `PROVISION_ARCHIVE_BASE`, `GITHUB_TOKEN`)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ARCHIVE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 2000;

/// Default GitHub API base URL
const GITHUB_API_BASE: &str = "https://api.github.com";
/// Default base for `<owner>/<repo>/archive/<ref>.zip` downloads
const GITHUB_ARCHIVE_BASE: &str = "https://github.com";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout for plain file downloads
    pub http_timeout: Duration,
    /// Timeout for repository metadata lookups (default branch)
    pub metadata_timeout: Duration,
    /// Timeout for a single source archive fetch attempt
    pub archive_timeout: Duration,
    /// Fixed wait before the one retry of a failed archive fetch
    pub archive_retry_backoff: Duration,
    pub github_api_base: String,
    pub archive_base: String,
    /// Sent as a bearer token to the metadata API when set
    pub github_token: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            metadata_timeout: Duration::from_secs(DEFAULT_METADATA_TIMEOUT_SECS),
            archive_timeout: Duration::from_secs(DEFAULT_ARCHIVE_TIMEOUT_SECS),
            archive_retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            github_api_base: GITHUB_API_BASE.to_string(),
            archive_base: GITHUB_ARCHIVE_BASE.to_string(),
            github_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigToml {
    http_timeout_secs: Option<u64>,
    metadata_timeout_secs: Option<u64>,
    archive_timeout_secs: Option<u64>,
    archive_retry_backoff_ms: Option<u64>,
    github_api_base: Option<String>,
    archive_base: Option<String>,
    github_token: Option<String>,
}

/// Clamp user-supplied timeouts to a sane range (5-300 seconds).
fn clamp_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(5, 300))
}

impl EngineConfig {
    /// Default location of the config file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("provision").join("config.toml"))
    }

    /// Load configuration from `path` (or the default path) plus the environment.
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut config = Self::default();
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        if let Some(path) = path.filter(|p| p.exists()) {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let parsed: ConfigToml = toml::from_str(&source)
                .with_context(|| format!("Invalid config: {}", path.display()))?;
            config.apply_toml(parsed);
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_toml(&mut self, t: ConfigToml) {
        if let Some(secs) = t.http_timeout_secs {
            self.http_timeout = clamp_secs(secs);
        }
        if let Some(secs) = t.metadata_timeout_secs {
            self.metadata_timeout = clamp_secs(secs);
        }
        if let Some(secs) = t.archive_timeout_secs {
            self.archive_timeout = clamp_secs(secs);
        }
        if let Some(ms) = t.archive_retry_backoff_ms {
            self.archive_retry_backoff = Duration::from_millis(ms);
        }
        if let Some(base) = t.github_api_base {
            self.github_api_base = base;
        }
        if let Some(base) = t.archive_base {
            self.archive_base = base;
        }
        if t.github_token.is_some() {
            self.github_token = t.github_token;
        }
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(secs) = get("PROVISION_HTTP_TIMEOUT").and_then(|s| s.parse::<u64>().ok()) {
            self.http_timeout = clamp_secs(secs);
        }
        if let Some(base) = get("PROVISION_GITHUB_API") {
            self.github_api_base = base;
        }
        if let Some(base) = get("PROVISION_ARCHIVE_BASE") {
            self.archive_base = base;
        }
        if let Some(token) = get("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
            self.github_token = Some(token);
        }
    }
}
