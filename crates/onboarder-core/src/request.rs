//! Typed request bodies and their mapping onto service endpoints.
use crate::claims::ClaimSet;
use crate::jwk::{Jwk, KeyAlgorithm};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// HTTP method of a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// DID method requested when creating a DID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidMethod {
    Key,
    Ebsi,
}

impl FromStr for DidMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(DidMethod::Key),
            "ebsi" => Ok(DidMethod::Ebsi),
            other => Err(format!("Unsupported method: {other}")),
        }
    }
}

/// A service operation with a typed request body.
pub trait Operation: Serialize {
    /// Endpoint relative to the service base address.
    const ENDPOINT: &'static str;
    const METHOD: Method = Method::Post;
}

/// Service information.
#[derive(Debug, Clone, Serialize)]
pub struct FetchInfo;

impl Operation for FetchInfo {
    const ENDPOINT: &'static str = "info/";
    const METHOD: Method = Method::Get;
}

/// Key creation by the service.
#[derive(Debug, Clone, Serialize)]
pub struct CreateKey {
    pub alg: KeyAlgorithm,
}

impl Operation for CreateKey {
    const ENDPOINT: &'static str = "create-key/";
}

/// DID creation from public key material.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDid {
    method: DidMethod,
    public_jwk: Jwk,
}

impl CreateDid {
    /// Takes the public projection of `jwk`; private members never reach the body.
    pub fn new(method: DidMethod, jwk: &Jwk) -> Self {
        Self {
            method,
            public_jwk: jwk.public_projection(),
        }
    }

    pub fn public_jwk(&self) -> &Jwk {
        &self.public_jwk
    }
}

impl Operation for CreateDid {
    const ENDPOINT: &'static str = "create-did/";
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveDid {
    pub did: String,
}

impl Operation for ResolveDid {
    const ENDPOINT: &'static str = "resolve-did/";
}

/// A DID referenced by a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Party {
    pub did: String,
}

impl Party {
    pub fn new(did: impl Into<String>) -> Self {
        Self { did: did.into() }
    }
}

/// A DID together with the full key it signs with.
#[derive(Debug, Clone, Serialize)]
pub struct SigningIdentity {
    pub did: String,
    pub jwk: Jwk,
    pub kid: String,
}

impl SigningIdentity {
    pub fn new(did: impl Into<String>, jwk: &Jwk, kid: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            jwk: jwk.clone(),
            kid: kid.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueVc {
    pub issuer: SigningIdentity,
    pub subject: Party,
    pub claims: ClaimSet,
}

impl Operation for IssueVc {
    const ENDPOINT: &'static str = "issue-vc/";
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueVp {
    pub signer: SigningIdentity,
    pub holder: Party,
    pub audience: Party,
    /// Credential tokens, in presentation order.
    pub credentials: Vec<String>,
}

impl Operation for IssueVp {
    const ENDPOINT: &'static str = "issue-vp/";
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyVc {
    pub token: String,
}

impl Operation for VerifyVc {
    const ENDPOINT: &'static str = "verify-vc/";
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyVp {
    pub token: String,
    pub audience: Party,
}

impl Operation for VerifyVp {
    const ENDPOINT: &'static str = "verify-vp/";
}

/// Method, endpoint and serialized body of one service request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub endpoint: &'static str,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    /// Serializes an operation into a request. `GET` requests carry no body.
    pub fn build<T: Operation>(operation: &T) -> Result<Self, serde_json::Error> {
        let body = match T::METHOD {
            Method::Get => None,
            Method::Post => Some(serde_json::to_value(operation)?),
        };
        Ok(Self {
            method: T::METHOD,
            endpoint: T::ENDPOINT,
            body,
        })
    }

    /// Body with the private members of any embedded `jwk` replaced, for display.
    pub fn redacted_body(&self) -> Option<Value> {
        let mut body = self.body.clone()?;
        redact(&mut body);
        Some(body)
    }
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(members) => {
            for (name, member) in members.iter_mut() {
                if name == "jwk" {
                    if let Ok(jwk) = Jwk::try_from(member.clone()) {
                        *member = jwk.redacted();
                        continue;
                    }
                }
                redact(member);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}
