//! CLI error type.

use std::fmt;

use repomirror::{ConfigError, SyncError};

/// Errors that end the CLI with a failure exit code.
#[derive(Debug)]
pub enum CliError {
    /// Invalid combination of settings.
    Config(String),
    /// The config file could not be read or parsed.
    ConfigFile(ConfigError),
    /// Logging could not be set up.
    Logging(String),
    /// The sync failed with a fatal error.
    Sync(SyncError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Sync(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<SyncError> for CliError {
    fn from(e: SyncError) -> Self {
        CliError::Sync(e)
    }
}
