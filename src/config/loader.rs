//! Configuration loading.
//!
//! Providers are applied in a fixed order: built-in defaults, then an
//! optional TOML file, then `EXCHANGE_HUB_*` environment variables. The
//! result is validated once and never changes for the life of the process.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{HubConfig, PeerConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "EXCHANGE_HUB_";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Merge(toml::ser::Error),
    Env { key: String, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Merge(e) => write!(f, "Merge error: {}", e),
            ConfigError::Env { key, message } => write!(f, "Invalid {}: {}", key, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// One step in the provider chain.
#[derive(Debug, Clone)]
pub enum ConfigProvider {
    File(PathBuf),
    Env(Vec<(String, String)>),
}

/// Ordered list of configuration providers layered over the defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    providers: Vec<ConfigProvider>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer a TOML file over what came before. Keys the file sets win;
    /// tables merge key by key, arrays (such as `peers`) are replaced whole.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.providers.push(ConfigProvider::File(path.into()));
        self
    }

    /// Layer the current process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env(std::env::vars())
    }

    /// Layer an explicit set of environment-style variables.
    pub fn with_env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        self.providers.push(ConfigProvider::Env(vars));
        self
    }

    /// Resolve every provider in order and validate the result.
    pub fn load(self) -> Result<HubConfig, ConfigError> {
        let mut config = HubConfig::default();
        for provider in self.providers {
            match provider {
                ConfigProvider::File(path) => config = layer_file(&config, &path)?,
                ConfigProvider::Env(vars) => apply_env(&mut config, vars)?,
            }
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HubConfig, ConfigError> {
    ConfigLoader::new().with_file(path).load()
}

fn layer_file(config: &HubConfig, path: &Path) -> Result<HubConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let overlay: toml::Table = toml::from_str(&content).map_err(ConfigError::Parse)?;
    let mut base = match toml::Value::try_from(config).map_err(ConfigError::Merge)? {
        toml::Value::Table(table) => table,
        _ => toml::Table::new(),
    };
    merge_tables(&mut base, overlay);
    toml::Value::Table(base).try_into().map_err(ConfigError::Parse)
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn apply_env(config: &mut HubConfig, vars: Vec<(String, String)>) -> Result<(), ConfigError> {
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else { continue };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match name {
            "SERVICE_NAME" => config.service.name = value.to_string(),
            "BIND_ADDRESS" => config.listener.bind_address = value.to_string(),
            "REQUEST_TIMEOUT_SECS" => config.timeouts.request_secs = parse_num(&key, value)?,
            "BREAKER_FAILURE_THRESHOLD" => {
                config.circuit_breaker.failure_threshold = parse_num(&key, value)?
            }
            "BREAKER_RESET_TIMEOUT_SECS" => {
                config.circuit_breaker.reset_timeout_secs = parse_num(&key, value)?
            }
            "BREAKER_HALF_OPEN_MAX_CALLS" => {
                config.circuit_breaker.half_open_max_calls = parse_num(&key, value)?
            }
            "ALLOWED_CALLERS" => {
                config.access.allowed_callers = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "INTERNAL_SECRET" => config.internal.shared_secret = Some(value.to_string()),
            "LOG_LEVEL" => config.observability.log_level = value.to_string(),
            other => {
                if let Some(rest) = other.strip_prefix("PEER_") {
                    if let Some(peer) = rest.strip_suffix("_URL") {
                        peer_entry(config, peer).base_url = Some(value.to_string());
                    } else if let Some(peer) = rest.strip_suffix("_PATH") {
                        peer_entry(config, peer).exchange_path = Some(value.to_string());
                    } else {
                        tracing::debug!(key = %key, "Ignoring unrecognised peer variable");
                    }
                } else {
                    tracing::debug!(key = %key, "Ignoring unrecognised environment variable");
                }
            }
        }
    }
    Ok(())
}

/// Find the peer an environment key refers to, registering it if new.
fn peer_entry<'a>(config: &'a mut HubConfig, env_name: &str) -> &'a mut PeerConfig {
    let normalise = |s: &str| s.replace('-', "_").to_uppercase();
    let wanted = normalise(env_name);
    let idx = match config.peers.iter().position(|p| normalise(&p.name) == wanted) {
        Some(idx) => idx,
        None => {
            config.peers.push(PeerConfig::new(env_name, None));
            config.peers.len() - 1
        }
    };
    &mut config.peers[idx]
}
