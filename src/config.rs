// Client configuration: built-in defaults, then an optional `conf.json`,
// then the `API_GATEWAY_URL` environment variable. Command-line flags are
// applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Name of the configuration file looked up by default.
pub const CONFIG_FILE: &str = "conf.json";

/// Environment variable that overrides the endpoint template.
pub const ENDPOINT_ENV: &str = "API_GATEWAY_URL";

pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3001/{function}";
pub const DEFAULT_MAX_MESSAGES: u32 = 20;
pub const DEFAULT_REFRESH_SECONDS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings shared by the gateway, the orchestrator and the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub region: String,
    /// URL template; `{region}` and `{function}` are substituted per call.
    pub endpoint: String,
    /// How many posts to request when listing.
    pub max_messages: u32,
    pub refresh_seconds: u64,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            region: DEFAULT_REGION.into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            max_messages: DEFAULT_MAX_MESSAGES,
            refresh_seconds: DEFAULT_REFRESH_SECONDS,
            debug: false,
        }
    }
}

/// On-disk shape; every key is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
struct FileConfig {
    region: Option<String>,
    endpoint: Option<String>,
    max_messages: Option<u32>,
    refresh_seconds: Option<u64>,
    debug: Option<bool>,
}

impl Config {
    /// Load configuration from `path`, or from the default locations when
    /// `path` is `None`. A missing default file just means defaults.
    ///
    /// The result is not validated; call [`Config::validate`] once any
    /// command-line overrides have been applied.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };
        if let Some(file) = file {
            config.merge_file(&file)?;
        }

        config.override_endpoint(std::env::var(ENDPOINT_ENV).ok());
        Ok(config)
    }

    /// Apply the value of `API_GATEWAY_URL`; unset or blank leaves the
    /// endpoint alone.
    fn override_endpoint(&mut self, value: Option<String>) {
        if let Some(endpoint) = value.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint;
        }
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(region) = file.region {
            self.region = region;
        }
        if let Some(endpoint) = file.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(max) = file.max_messages {
            self.max_messages = max;
        }
        if let Some(refresh) = file.refresh_seconds {
            self.refresh_seconds = refresh;
        }
        if let Some(debug) = file.debug {
            self.debug = debug;
        }
        Ok(())
    }

    /// Reject settings the client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_messages == 0 {
            return Err(ConfigError::Invalid("MaxMessages must be at least 1".into()));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("Region must not be empty".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("Endpoint must not be empty".into()));
        }
        Ok(())
    }
}

/// `conf.json` in the working directory, else the per-user config dir.
fn default_config_path() -> Option<PathBuf> {
    find_config(Path::new("."), dirs::config_dir().as_deref())
}

fn find_config(work_dir: &Path, user_config_dir: Option<&Path>) -> Option<PathBuf> {
    let local = work_dir.join(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    user_config_dir
        .map(|dir| dir.join("postboard").join(CONFIG_FILE))
        .filter(|p| p.is_file())
}
