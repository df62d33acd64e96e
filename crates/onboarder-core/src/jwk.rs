//! JSON Web Key model with key-type specific public projection.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Placeholder substituted for private members when a key is displayed.
pub const REDACTED: &str = "***";

/// An error relating to JWK key material.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwkError {
    /// Key material is not a JSON object.
    #[error("JWK is not a JSON object.")]
    NotAnObject,
    /// The `kty` discriminant is absent.
    #[error("JWK has no 'kty' member.")]
    MissingKeyType,
    /// The `kty` discriminant is neither `RSA` nor `EC`.
    #[error("Unsupported key type: {0}.")]
    UnsupportedKeyType(String),
    /// A public member required by the key type is absent or not a string.
    #[error("JWK of key type {kty} is missing member '{member}'.")]
    MissingMember { kty: KeyType, member: &'static str },
    /// The EC curve has no known signing algorithm.
    #[error("Unsupported curve: {0}.")]
    UnsupportedCurve(String),
    /// Signing requires private key material.
    #[error("JWK carries no private key material.")]
    NotPrivate,
}

/// The `kty` discriminant of a JWK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Ec,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa => "RSA",
            KeyType::Ec => "EC",
        }
    }

    /// Members that may be published for this key type, `kty` included.
    pub fn public_members(&self) -> &'static [&'static str] {
        match self {
            KeyType::Rsa => &["kty", "n", "e"],
            KeyType::Ec => &["kty", "crv", "x", "y"],
        }
    }

    /// Members whose presence marks a key of this type as private.
    pub fn private_members(&self) -> &'static [&'static str] {
        match self {
            KeyType::Rsa => &["d", "p", "q", "dp", "dq", "qi", "oth"],
            KeyType::Ec => &["d"],
        }
    }
}

impl FromStr for KeyType {
    type Err = JwkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA" => Ok(KeyType::Rsa),
            "EC" => Ok(KeyType::Ec),
            other => Err(JwkError::UnsupportedKeyType(other.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Algorithm requested from the service when creating a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    Rsa,
    Secp256k1,
}

impl FromStr for KeyAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rsa" => Ok(KeyAlgorithm::Rsa),
            "secp256k1" => Ok(KeyAlgorithm::Secp256k1),
            other => Err(format!("Unsupported algorithm: {other}")),
        }
    }
}

/// A JSON Web Key of a supported key type.
///
/// All members are kept verbatim so a key written back to the vault is unchanged; the key type
/// is validated on construction and drives projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Jwk {
    kty: KeyType,
    members: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for Jwk {
    type Error = JwkError;

    fn try_from(members: Map<String, Value>) -> Result<Self, Self::Error> {
        let kty = match members.get("kty") {
            None => return Err(JwkError::MissingKeyType),
            Some(Value::String(kty)) => kty.parse::<KeyType>()?,
            Some(other) => return Err(JwkError::UnsupportedKeyType(other.to_string())),
        };
        for &member in kty.public_members() {
            if !matches!(members.get(member), Some(Value::String(_))) {
                return Err(JwkError::MissingMember { kty, member });
            }
        }
        Ok(Self { kty, members })
    }
}

impl TryFrom<Value> for Jwk {
    type Error = JwkError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(members) => Jwk::try_from(members),
            _ => Err(JwkError::NotAnObject),
        }
    }
}

impl From<Jwk> for Map<String, Value> {
    fn from(jwk: Jwk) -> Self {
        jwk.members
    }
}

impl Jwk {
    pub fn key_type(&self) -> KeyType {
        self.kty
    }

    /// Returns a member of the key.
    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    /// Member names of the key, in stored order.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Returns the public projection: only the members published for the key type.
    pub fn public_projection(&self) -> Jwk {
        let allowed = self.kty.public_members();
        let members = self
            .members
            .iter()
            .filter(|(name, _)| allowed.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Jwk {
            kty: self.kty,
            members,
        }
    }

    pub fn is_private(&self) -> bool {
        self.kty
            .private_members()
            .iter()
            .any(|member| self.members.contains_key(*member))
    }

    /// Checks the key can be used for signing.
    pub fn require_private(&self) -> Result<&Self, JwkError> {
        if self.is_private() {
            Ok(self)
        } else {
            Err(JwkError::NotPrivate)
        }
    }

    /// Resolves the JWS algorithm used when signing with this key.
    pub fn algorithm(&self) -> Result<&'static str, JwkError> {
        match self.kty {
            KeyType::Rsa => Ok("RS256"),
            KeyType::Ec => {
                let crv = self
                    .members
                    .get("crv")
                    .and_then(Value::as_str)
                    .ok_or(JwkError::MissingMember {
                        kty: self.kty,
                        member: "crv",
                    })?;
                match crv {
                    "secp256k1" => Ok("ES256K"),
                    "P-256" => Ok("ES256"),
                    "P-384" => Ok("ES384"),
                    "P-521" => Ok("ES512"),
                    other => Err(JwkError::UnsupportedCurve(other.to_string())),
                }
            }
        }
    }

    /// Copy of the key with private members replaced, for display.
    pub fn redacted(&self) -> Value {
        let private = self.kty.private_members();
        Value::Object(
            self.members
                .iter()
                .map(|(name, value)| {
                    if private.contains(&name.as_str()) {
                        (name.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (name.clone(), value.clone())
                    }
                })
                .collect(),
        )
    }
}
