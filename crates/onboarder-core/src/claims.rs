//! Claim set assembly for credential issuance.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// An error relating to claim assembly.
#[derive(Error, Debug)]
pub enum ClaimsError {
    /// Neither a claims file nor key=value pairs yielded a claim.
    #[error("No claims provided: pass a claims JSON file and/or key=value claims.")]
    NoClaimsProvided,
    /// Ad-hoc claim without `=` or with an empty key.
    #[error("Claim '{0}' is not of the form key=value.")]
    MalformedPair(String),
    /// Claims file could not be read.
    #[error("Failed to read claims file {path}: {source}")]
    FailedToRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Claims file is not valid JSON.
    #[error("Failed to parse claims file {path}: {source}")]
    FailedToParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// Claims file top level is not a mapping.
    #[error("Claims file {0} does not hold a JSON object.")]
    NotAnObject(PathBuf),
}

/// Claims about a credential subject, keyed by claim name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}

/// Splits an ad-hoc claim on its first `=`.
pub fn parse_pair(pair: &str) -> Result<(&str, &str), ClaimsError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(ClaimsError::MalformedPair(pair.to_string())),
    }
}

/// Merges file-sourced claims with ad-hoc `key=value` pairs.
///
/// Pairs are applied after the JSON seed and replace claims of the same name. Pair values are
/// kept as strings.
pub fn assemble<S: AsRef<str>>(
    json_claims: Option<Map<String, Value>>,
    pairs: &[S],
) -> Result<ClaimSet, ClaimsError> {
    let mut claims = json_claims.unwrap_or_default();
    for pair in pairs {
        let (key, value) = parse_pair(pair.as_ref())?;
        if claims
            .insert(key.to_string(), Value::String(value.to_string()))
            .is_some()
        {
            debug!("Claim '{}' from file replaced by ad-hoc value", key);
        }
    }
    if claims.is_empty() {
        return Err(ClaimsError::NoClaimsProvided);
    }
    Ok(ClaimSet(claims))
}

/// Reads the top-level mapping of a claims file.
pub fn read_claims_file(path: &Path) -> Result<Map<String, Value>, ClaimsError> {
    let contents = fs::read_to_string(path).map_err(|source| ClaimsError::FailedToRead {
        path: path.to_path_buf(),
        source,
    })?;
    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(ClaimsError::NotAnObject(path.to_path_buf())),
        Err(source) => Err(ClaimsError::FailedToParse {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Assembles claims from an optional claims file and ad-hoc pairs.
///
/// Fails with [`ClaimsError::NoClaimsProvided`] before touching the file system when both
/// sources are absent.
pub fn assemble_from_file<S: AsRef<str>>(
    claims_file: Option<&Path>,
    pairs: &[S],
) -> Result<ClaimSet, ClaimsError> {
    if claims_file.is_none() && pairs.is_empty() {
        return Err(ClaimsError::NoClaimsProvided);
    }
    let json_claims = claims_file.map(read_claims_file).transpose()?;
    assemble(json_claims, pairs)
}
