//! Key vault API with default implementations.
use crate::jwk::{Jwk, JwkError};
use crate::utils::{confined_path, write_atomic};
use serde_json::{from_str, to_string_pretty as to_json, Value};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// An error relating to key vault access.
#[derive(Error, Debug)]
pub enum KeyManagerError {
    /// Key file could not be opened.
    #[error("Key could not be loaded from {path}: {source}")]
    FailedToLoadKey {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Key file could not be written.
    #[error("Key could not be saved to {path}: {source}")]
    FailedToSaveKey {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to read UTF-8 data.
    #[error("Failed to read UTF-8 data.")]
    FailedToReadUTF8,
    /// Failed to parse JSON string to JWK.
    #[error("Failed to parse JSON string to JWK: {0}")]
    FailedToParseJWK(serde_json::Error),
    /// Parsed JSON is not a usable JWK.
    #[error("Malformed key: {0}")]
    MalformedKey(JwkError),
    /// Key name resolves outside the vault directory.
    #[error("Key path is not inside the vault: {0}")]
    OutsideVault(PathBuf),
}

impl From<JwkError> for KeyManagerError {
    fn from(err: JwkError) -> Self {
        KeyManagerError::MalformedKey(err)
    }
}

/// Reads and writes JWK files under a vault directory.
///
/// The vault only ever holds key material: key names are resolved relative to
/// [`vault_dir`](KeyManager::vault_dir) and names leaving it are rejected.
pub trait KeyManager {
    /// Root directory of the vault.
    fn vault_dir(&self) -> &Path;

    /// Gets the path of a named key inside the vault.
    fn get_path(&self, name: &Path) -> Result<PathBuf, KeyManagerError> {
        confined_path(self.vault_dir(), name)
            .ok_or_else(|| KeyManagerError::OutsideVault(name.to_path_buf()))
    }

    /// Checks whether a key already exists on disk.
    fn key_exists(&self, name: &Path) -> bool {
        self.get_path(name).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Reads a key.
    fn read_key(&self, name: &Path) -> Result<Jwk, KeyManagerError> {
        let path = self.get_path(name)?;
        debug!("Reading key from {}", path.display());
        let file = File::open(&path).map_err(|source| KeyManagerError::FailedToLoadKey {
            path: path.clone(),
            source,
        })?;
        self.read_key_from(Box::new(file))
    }

    /// Reads one key from a Reader.
    fn read_key_from(&self, mut reader: Box<dyn Read>) -> Result<Jwk, KeyManagerError> {
        let buf: &mut String = &mut String::new();
        if reader.read_to_string(buf).is_err() {
            return Err(KeyManagerError::FailedToReadUTF8);
        }
        let value: Value = from_str(buf).map_err(KeyManagerError::FailedToParseJWK)?;
        Ok(Jwk::try_from(value)?)
    }

    /// Saves a key to disk, replacing any existing key of the same name.
    fn save_key(&self, name: &Path, key: &Jwk) -> Result<PathBuf, KeyManagerError> {
        let path = self.get_path(name)?;
        let json = to_json(key).map_err(KeyManagerError::FailedToParseJWK)?;
        write_atomic(&path, format!("{json}\n").as_bytes()).map_err(|source| {
            KeyManagerError::FailedToSaveKey {
                path: path.clone(),
                source,
            }
        })?;
        debug!("Saved {} key to {}", key.key_type(), path.display());
        Ok(path)
    }
}

/// File system vault.
#[derive(Debug, Clone)]
pub struct VaultKeyManager {
    vault_dir: PathBuf,
}

impl VaultKeyManager {
    pub fn new(vault_dir: impl Into<PathBuf>) -> Self {
        Self {
            vault_dir: vault_dir.into(),
        }
    }
}

impl KeyManager for VaultKeyManager {
    fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }
}
