//! Document store for DIDs, VC/VP tokens and verification outputs.
use crate::utils::{confined_path, strip_line_terminator, write_atomic};
use serde::Serialize;
use serde_json::to_string_pretty as to_json;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// An error relating to the document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// File could not be read.
    #[error("Failed to read {path}: {source}")]
    FailedToRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// File could not be written.
    #[error("Failed to write {path}: {source}")]
    FailedToWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Name resolves outside the storage directory.
    #[error("Path is not inside the document store: {0}")]
    OutsideStore(PathBuf),
    /// Token file holds no token.
    #[error("No token found in {0}")]
    EmptyToken(PathBuf),
    /// Tokens are persisted as single-line text.
    #[error("Token spans multiple lines and cannot be stored.")]
    MultiLineToken,
    #[error("JSON Serialization Error: {0}.")]
    FailedToSerialize(serde_json::Error),
}

/// Reads and writes non-key artifacts under a storage directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    storage_dir: PathBuf,
}

impl DocumentStore {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Gets the path of a named artifact inside the store.
    pub fn get_path(&self, name: &Path) -> Result<PathBuf, StoreError> {
        confined_path(&self.storage_dir, name)
            .ok_or_else(|| StoreError::OutsideStore(name.to_path_buf()))
    }

    /// Reads a persisted token, dropping one trailing line terminator.
    pub fn read_token(&self, name: &Path) -> Result<String, StoreError> {
        let path = self.get_path(name)?;
        debug!("Reading token from {}", path.display());
        let contents = fs::read_to_string(&path).map_err(|source| StoreError::FailedToRead {
            path: path.clone(),
            source,
        })?;
        let token = strip_line_terminator(&contents);
        if token.is_empty() {
            return Err(StoreError::EmptyToken(path));
        }
        Ok(token.to_string())
    }

    /// Reads tokens in the order the names are given.
    pub fn read_tokens<P: AsRef<Path>>(&self, names: &[P]) -> Result<Vec<String>, StoreError> {
        names
            .iter()
            .map(|name| self.read_token(name.as_ref()))
            .collect()
    }

    /// Writes a token as a single line of text.
    pub fn write_token(&self, name: &Path, token: &str) -> Result<PathBuf, StoreError> {
        if token.contains('\n') || token.contains('\r') {
            return Err(StoreError::MultiLineToken);
        }
        self.write(name, format!("{token}\n").as_bytes())
    }

    /// Writes a JSON document.
    pub fn write_document<T: Serialize + ?Sized>(
        &self,
        name: &Path,
        document: &T,
    ) -> Result<PathBuf, StoreError> {
        let json = to_json(document).map_err(StoreError::FailedToSerialize)?;
        self.write(name, format!("{json}\n").as_bytes())
    }

    fn write(&self, name: &Path, contents: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.get_path(name)?;
        write_atomic(&path, contents).map_err(|source| StoreError::FailedToWrite {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(path)
    }
}
