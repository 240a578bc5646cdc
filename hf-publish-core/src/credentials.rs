//! Credential loading for the hub: `HF_TOKEN` from the process environment,
//! optionally populated from a `.env` file first.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "HF_TOKEN";
/// Environment variable overriding the hub base URL.
pub const ENDPOINT_ENV: &str = "HF_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Bearer credential for the hub. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct HubToken(String);

impl HubToken {
    /// Wraps a raw token, rejecting empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(HubToken(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HubToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HubToken(***)")
    }
}

/// Errors raised before any network activity.
#[derive(Debug)]
pub enum ConfigError {
    MissingToken,
    EnvFile { path: PathBuf, reason: String },
    InvalidRepoId(String),
    MissingSpaceSdk,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingToken => write!(
                f,
                "{TOKEN_ENV} not found. Please set it in your .env file or environment variables."
            ),
            ConfigError::EnvFile { path, reason } => {
                write!(f, "failed to load env file {}: {reason}", path.display())
            }
            ConfigError::InvalidRepoId(id) => write!(
                f,
                "invalid repository id {id:?}: expected `name` or `owner/name`"
            ),
            ConfigError::MissingSpaceSdk => {
                write!(f, "a space sdk is required when creating a space repository")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Reads the token from the process environment.
pub fn load_token() -> Result<HubToken, ConfigError> {
    load_token_with(|key| std::env::var(key).ok())
}

/// Reads the token through `lookup`, which maps a variable name to its value.
pub fn load_token_with<L>(lookup: L) -> Result<HubToken, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    match lookup(TOKEN_ENV) {
        Some(raw) => {
            let token = HubToken::new(raw).map_err(|e| {
                error!("{TOKEN_ENV} is set but empty");
                e
            })?;
            info!(token_len = token.expose().len(), "{TOKEN_ENV} found in env");
            Ok(token)
        }
        None => {
            error!("{TOKEN_ENV} environment variable not set");
            Err(ConfigError::MissingToken)
        }
    }
}

/// Resolves the hub base URL: explicit value, then `HF_ENDPOINT`, then the public hub.
pub fn resolve_endpoint(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(ENDPOINT_ENV).ok())
        .filter(|e| !e.trim().is_empty())
        .map(|e| e.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

/// Loads an explicit `.env`-style file into the process environment.
/// Unlike the startup `.env` lookup, a missing file here is an error.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => {
            info!(env_file = %path.display(), "Loaded env file");
            Ok(())
        }
        Err(e) => {
            error!(error = ?e, env_file = %path.display(), "Failed to load env file");
            Err(ConfigError::EnvFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }
}
