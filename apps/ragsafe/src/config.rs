//! # Configuration
//!
//! Optional TOML configuration file.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100
//! cors_origins = ["http://localhost:3000"]
//! api_key = "change-me"
//!
//! [state]
//! path = "rag-state.json"
//! autosave = true
//! ```
//!
//! Every key is optional. Command-line flags override file values, and
//! environment variables override both for the server security settings.

use ragsafe_core::RagError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// State file used when neither the command line nor the config names one.
pub const DEFAULT_STATE_PATH: &str = "rag-state.json";

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Largest config file accepted (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// CONFIG SECTIONS
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub state: StateConfig,
}

/// `[server]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests per second. `0` disables rate limiting.
    pub rate_limit: Option<u32>,
    /// Allowed CORS origins. `["*"]` allows all.
    pub cors_origins: Option<Vec<String>>,
    /// Bearer key required on every endpoint but `/health`.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rate_limit: None,
            cors_origins: None,
            api_key: None,
        }
    }
}

/// `[state]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    pub path: Option<PathBuf>,
    /// Write the state file after every successful server mutation.
    pub autosave: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: None,
            autosave: true,
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, RagError> {
        toml::from_str(text).map_err(|e| RagError::SerializationError(format!("Config: {}", e)))
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            RagError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(RagError::SerializationError(format!(
                "Config file {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            RagError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, RagError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve the state file: command line, then config, then default.
    #[must_use]
    pub fn state_path(&self, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.state.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH))
    }
}

// =============================================================================
// TESTS
// =============================================================================
