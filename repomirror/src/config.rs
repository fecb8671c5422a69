//! Run configuration.
//!
//! [`SyncConfig`] holds the resolved settings for a run. [`ConfigFile`] is the
//! optional INI file layered underneath command-line flags:
//!
//! ```ini
//! [hub]
//! endpoint = https://huggingface.co
//! token = hf_xxx
//!
//! [download]
//! local_dir = ./downloads
//! timeout = 60
//! chunk_size_mb = 1
//! max_attempts = 3
//! parallel = 1
//! retry_delay_ms = 500
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::repo::hub::DEFAULT_ENDPOINT;
use crate::transfer::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::transfer::stream::DEFAULT_CHUNK_SIZE;

/// Default destination directory.
pub const DEFAULT_LOCAL_DIR: &str = "./downloads";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of files transferred at once.
pub const DEFAULT_PARALLEL: usize = 1;

/// Directory under the platform config dir.
const CONFIG_DIR_NAME: &str = "repomirror";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid value for {section}.{key}: {value:?}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// Resolved settings for a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Hub base URL.
    pub endpoint: String,
    /// Bearer credential, if any.
    pub token: Option<String>,
    /// Root under which mirrors are laid out.
    pub local_dir: PathBuf,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bytes per body read.
    pub chunk_size: usize,
    /// Attempts per file, including the first.
    pub max_attempts: u32,
    /// Files transferred at once.
    pub parallel: usize,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            local_dir: PathBuf::from(DEFAULT_LOCAL_DIR),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            parallel: DEFAULT_PARALLEL,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl SyncConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the credential; an empty string clears it.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_local_dir(mut self, local_dir: impl Into<PathBuf>) -> Self {
        self.local_dir = local_dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the chunk size (minimum 1 byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the attempts per file (minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the number of concurrent files (minimum 1).
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// `[hub]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubSection {
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

/// `[download]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSection {
    pub local_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub chunk_size_mb: Option<usize>,
    pub max_attempts: Option<u32>,
    pub parallel: Option<usize>,
    pub retry_delay_ms: Option<u64>,
}

/// Contents of the INI configuration file. Absent keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub hub: HubSection,
    pub download: DownloadSection,
}

impl ConfigFile {
    /// Load from the default location, or return empty settings when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        match config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut config = Self::default();

        if let Some(hub) = ini.section(Some("hub")) {
            config.hub.endpoint = non_empty(hub, "endpoint");
            config.hub.token = non_empty(hub, "token");
        }

        if let Some(download) = ini.section(Some("download")) {
            config.download.local_dir = non_empty(download, "local_dir").map(PathBuf::from);
            config.download.timeout_secs = parse_value(download, "download", "timeout")?;
            config.download.chunk_size_mb = parse_value(download, "download", "chunk_size_mb")?;
            config.download.max_attempts = parse_value(download, "download", "max_attempts")?;
            config.download.parallel = parse_value(download, "download", "parallel")?;
            config.download.retry_delay_ms = parse_value(download, "download", "retry_delay_ms")?;
        }

        Ok(config)
    }

    /// Overlay the values present in this file onto `config`.
    pub fn apply_to(&self, mut config: SyncConfig) -> SyncConfig {
        if let Some(endpoint) = &self.hub.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        if let Some(token) = &self.hub.token {
            config = config.with_token(Some(token.clone()));
        }

        let d = &self.download;
        if let Some(dir) = &d.local_dir {
            config = config.with_local_dir(dir.clone());
        }
        if let Some(secs) = d.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(mb) = d.chunk_size_mb {
            config = config.with_chunk_size(mb.saturating_mul(1024 * 1024));
        }
        if let Some(n) = d.max_attempts {
            config = config.with_max_attempts(n);
        }
        if let Some(n) = d.parallel {
            config = config.with_parallel(n);
        }
        if let Some(ms) = d.retry_delay_ms {
            config = config.with_retry_delay(Duration::from_millis(ms));
        }
        config
    }
}

/// Default config file location: `<config dir>/repomirror/config.ini`.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn non_empty(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_value<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match non_empty(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                section: section_name.to_string(),
                key: key.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.endpoint, "https://huggingface.co");
        assert_eq!(config.local_dir, PathBuf::from("./downloads"));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.parallel, 1);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_builders_clamp() {
        let config = SyncConfig::default()
            .with_chunk_size(0)
            .with_max_attempts(0)
            .with_parallel(0)
            .with_token(Some("  ".to_string()));
        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.parallel, 1);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_parse_and_apply() {
        let file = ConfigFile::parse(
            "[hub]\nendpoint = https://hub.example.com\ntoken = secret\n\n\
             [download]\nlocal_dir = /srv/mirror\ntimeout = 15\nchunk_size_mb = 4\n\
             max_attempts = 5\nparallel = 2\nretry_delay_ms = 0\n",
        )
        .unwrap();

        let config = file.apply_to(SyncConfig::default());
        assert_eq!(config.endpoint, "https://hub.example.com");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.local_dir, PathBuf::from("/srv/mirror"));
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.chunk_size, 4 * 1024 * 1024);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.parallel, 2);
        assert_eq!(config.retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let file = ConfigFile::parse("[download]\nparallel = 3\n").unwrap();
        let config = file.apply_to(SyncConfig::default());
        assert_eq!(config.parallel, 3);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = ConfigFile::parse("[download]\ntimeout = soon\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "timeout");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[hub]\ntoken = from-file").unwrap();

        let config = ConfigFile::load_from(file.path()).unwrap();
        assert_eq!(config.hub.token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = ConfigFile::load_from(&temp.path().join("absent.ini"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
