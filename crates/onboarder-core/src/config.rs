//! Configuration types and utilities.
use crate::ONBOARDER_CONFIG;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_VAULT_DIR: &str = "~/.onboarder/vault";
const DEFAULT_STORAGE_DIR: &str = "~/.onboarder/storage";

/// An error relating to configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error reading config file {path}: {source}")]
    FailedToRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error parsing config file: {0}")]
    FailedToParse(#[from] toml::de::Error),
    #[error("Failed to expand path '{path}': {reason}")]
    FailedToExpand { path: String, reason: String },
    #[error("Vault directory {vault} and storage directory {storage} must not overlap.")]
    OverlappingStores { vault: PathBuf, storage: PathBuf },
}

/// URL scheme of the service.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("Unsupported protocol: {other}")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// Address of the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceAddress {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl Default for ServiceAddress {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServiceAddress {
    /// Base address `scheme://host[:port]/`. The port is only included for `localhost`.
    pub fn base_url(&self) -> String {
        if self.host == DEFAULT_HOST {
            format!("{}://{}:{}/", self.protocol, self.host, self.port)
        } else {
            format!("{}://{}/", self.protocol, self.host)
        }
    }

    /// Full URL of an endpoint relative to the base address.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url(), endpoint.trim_start_matches('/'))
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url())
    }
}

/// Configuration variables for the onboarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboarderConfig {
    pub service: ServiceAddress,
    /// Directory holding private key material only.
    pub vault_dir: String,
    /// Directory holding DIDs, tokens and verification documents.
    pub storage_dir: String,
}

impl Default for OnboarderConfig {
    fn default() -> Self {
        Self {
            service: ServiceAddress::default(),
            vault_dir: DEFAULT_VAULT_DIR.to_string(),
            storage_dir: DEFAULT_STORAGE_DIR.to_string(),
        }
    }
}

impl OnboarderConfig {
    /// Expands the configured directories and checks they are disjoint.
    pub fn storage_layout(&self) -> Result<StorageLayout, ConfigError> {
        StorageLayout::new(&self.vault_dir, &self.storage_dir)
    }
}

/// Resolved vault and document store directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub vault_dir: PathBuf,
    pub storage_dir: PathBuf,
}

impl StorageLayout {
    /// Expands `~` and variables from the process environment.
    pub fn new(vault_dir: &str, storage_dir: &str) -> Result<Self, ConfigError> {
        Self::with_context(vault_dir, storage_dir, |var| std::env::var(var).ok())
    }

    /// Expands `~` from the process environment and variables through `lookup`.
    pub fn with_context<F>(vault_dir: &str, storage_dir: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vault_dir = expand(vault_dir, &lookup)?;
        let storage_dir = expand(storage_dir, &lookup)?;
        let (vault, storage) = (normalize(&vault_dir), normalize(&storage_dir));
        if vault.starts_with(&storage) || storage.starts_with(&vault) {
            return Err(ConfigError::OverlappingStores {
                vault: vault_dir,
                storage: storage_dir,
            });
        }
        Ok(Self {
            vault_dir,
            storage_dir,
        })
    }
}

fn expand<F>(path: &str, lookup: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let context = |var: &str| match lookup(var) {
        Some(value) => Ok(Some(value)),
        None => Err(std::env::VarError::NotPresent),
    };
    shellexpand::full_with_context(path, home_dir, context)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|err| ConfigError::FailedToExpand {
            path: path.to_string(),
            reason: err.to_string(),
        })
}

fn home_dir() -> Option<String> {
    std::env::var("HOME").ok()
}

// Lexical absolute form; directories need not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Wrapper struct for parsing the `onboarder` table.
#[derive(Serialize, Deserialize, Debug, Default)]
struct Config {
    /// Onboarder configuration data.
    #[serde(default)]
    onboarder: OnboarderConfig,
}

/// Parses and returns onboarder configuration.
pub fn parse_toml(toml_str: &str) -> Result<OnboarderConfig, ConfigError> {
    Ok(toml::from_str::<Config>(toml_str)?.onboarder)
}

/// Reads configuration from a TOML file.
pub fn read_config(path: &Path) -> Result<OnboarderConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::FailedToRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml(&contents)
}

/// Reads the file named by `ONBOARDER_CONFIG`, falling back to defaults when unset.
pub fn load_config() -> Result<OnboarderConfig, ConfigError> {
    match std::env::var(ONBOARDER_CONFIG) {
        Ok(path) => read_config(Path::new(&path)),
        Err(_) => Ok(OnboarderConfig::default()),
    }
}
