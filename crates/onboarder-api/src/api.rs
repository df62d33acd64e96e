//! API for key, DID, VC and VP lifecycle functionality.
use crate::errors::OnboarderAPIError;
use crate::http_client::HttpClient;
use async_trait::async_trait;
use onboarder_core::{
    claims::assemble_from_file,
    config::{OnboarderConfig, ServiceAddress},
    jwk::{Jwk, JwkError, KeyAlgorithm},
    key_manager::{KeyManager, VaultKeyManager},
    request::{
        CreateDid, CreateKey, DidMethod, FetchInfo, IssueVc, IssueVp, Operation, Party,
        RequestDescriptor, ResolveDid, SigningIdentity, VerifyVc, VerifyVp,
    },
    store::DocumentStore,
};
use serde_json::{to_string_pretty, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Parsed service response. Non-JSON bodies are kept as a JSON string.
    pub response: Value,
    /// Where the requested artifact was saved, if an output file was given.
    pub saved_to: Option<PathBuf>,
}

/// The artifact of a response that an output file receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    Key,
    Did,
    Token,
    Document,
}

impl Artifact {
    fn name(&self) -> &'static str {
        match self {
            Artifact::Key => "key",
            Artifact::Did => "DID",
            Artifact::Token => "token",
            Artifact::Document => "document",
        }
    }
}

/// State of one invocation: service address, local stores and transport.
pub struct OnboarderContext {
    service: ServiceAddress,
    vault: VaultKeyManager,
    store: DocumentStore,
    client: Box<dyn HttpClient>,
    verbose: bool,
}

impl OnboarderContext {
    /// Resolves the storage layout of `config`; fails if vault and store overlap.
    pub fn new(
        config: &OnboarderConfig,
        client: Box<dyn HttpClient>,
    ) -> Result<Self, OnboarderAPIError> {
        let layout = config.storage_layout()?;
        debug!(
            "Vault: {}, storage: {}",
            layout.vault_dir.display(),
            layout.storage_dir.display()
        );
        Ok(Self {
            service: config.service.clone(),
            vault: VaultKeyManager::new(layout.vault_dir),
            store: DocumentStore::new(layout.storage_dir),
            client,
            verbose: false,
        })
    }

    /// Prints each request, with private key members redacted, before it is sent.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn service(&self) -> &ServiceAddress {
        &self.service
    }

    pub fn vault(&self) -> &VaultKeyManager {
        &self.vault
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Sends exactly one request. Any non-2xx status is a failure carrying the raw body.
    pub async fn dispatch(&self, request: RequestDescriptor) -> Result<Value, OnboarderAPIError> {
        let url = self.service.url_for(request.endpoint);
        if self.verbose {
            eprintln!("{} {}", request.method, url);
            if let Some(body) = request.redacted_body() {
                let payload = to_string_pretty(&body).map_err(OnboarderAPIError::FailedToSerialize)?;
                eprintln!("{payload}");
            }
        }
        info!("{} {}", request.method, url);

        let response = self.client.send(request.method, &url, request.body).await?;
        debug!("Response status: {}", response.status);
        if !response.status.is_success() {
            return Err(OnboarderAPIError::RemoteFailure {
                status: response.status,
                body: response.text(),
            });
        }
        Ok(response
            .json()
            .unwrap_or_else(|_| Value::String(response.text())))
    }

    // Rejects output names outside their store before any request is sent.
    fn check_out(&self, artifact: Artifact, out: Option<&Path>) -> Result<(), OnboarderAPIError> {
        if let Some(out) = out {
            match artifact {
                Artifact::Key => {
                    self.vault.get_path(out)?;
                }
                _ => {
                    self.store.get_path(out)?;
                }
            }
        }
        Ok(())
    }

    fn persist(
        &self,
        artifact: Artifact,
        response: Value,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        let out = match out {
            Some(out) => out,
            None => {
                return Ok(Outcome {
                    response,
                    saved_to: None,
                })
            }
        };
        match self.save(artifact, out, &response) {
            Ok(Some(path)) => {
                info!("Saved {} to {}", artifact.name(), path.display());
                Ok(Outcome {
                    response,
                    saved_to: Some(path),
                })
            }
            Ok(None) => Err(OnboarderAPIError::MissingArtifact {
                artifact: artifact.name(),
                response,
            }),
            Err(source) => Err(OnboarderAPIError::PersistFailed {
                response,
                source: Box::new(source),
            }),
        }
    }

    /// Returns `None` when the response lacks the artifact.
    fn save(
        &self,
        artifact: Artifact,
        out: &Path,
        response: &Value,
    ) -> Result<Option<PathBuf>, OnboarderAPIError> {
        match artifact {
            Artifact::Key => {
                let member = match response.get("jwk") {
                    Some(member) => member,
                    None if response.get("kty").is_some() => response,
                    None => return Ok(None),
                };
                let key = match Jwk::try_from(member.clone()) {
                    Ok(key) => key,
                    Err(JwkError::NotAnObject) => return Ok(None),
                    Err(err) => return Err(err.into()),
                };
                Ok(Some(self.vault.save_key(out, &key)?))
            }
            Artifact::Did => match response.get("did").and_then(Value::as_str) {
                Some(did) if !did.is_empty() => Ok(Some(self.store.write_token(out, did)?)),
                _ => Ok(None),
            },
            Artifact::Token => {
                let token = response
                    .get("token")
                    .and_then(Value::as_str)
                    .or_else(|| response.as_str());
                match token {
                    Some(token) if !token.is_empty() => {
                        Ok(Some(self.store.write_token(out, token)?))
                    }
                    _ => Ok(None),
                }
            }
            Artifact::Document => Ok(Some(self.store.write_document(out, response)?)),
        }
    }

    /// Reads a signing key, which must carry private material.
    fn read_signing_key(&self, name: &Path) -> Result<Jwk, OnboarderAPIError> {
        let key = self.vault.read_key(name)?;
        key.require_private()?;
        let alg = key.algorithm()?;
        debug!("Signing with {} key, algorithm {}", key.key_type(), alg);
        Ok(key)
    }
}

fn build<T: Operation>(operation: &T) -> Result<RequestDescriptor, OnboarderAPIError> {
    RequestDescriptor::build(operation).map_err(OnboarderAPIError::FailedToSerialize)
}

fn require_did(role: &str, did: &str) -> Result<(), OnboarderAPIError> {
    if did.trim().is_empty() {
        return Err(OnboarderAPIError::Validation(format!(
            "{role} DID must not be empty."
        )));
    }
    Ok(())
}

/// Inputs of VC issuance.
#[derive(Debug, Clone, Default)]
pub struct VcIssuance {
    /// Issuer key, relative to the vault.
    pub key: PathBuf,
    pub kid: String,
    pub issuer: String,
    pub subject: String,
    /// Claims file, read from the given path.
    pub claims_json: Option<PathBuf>,
    /// Ad-hoc `key=value` claims.
    pub claims: Vec<String>,
}

/// Inputs of VP issuance.
#[derive(Debug, Clone, Default)]
pub struct VpIssuance {
    /// Signer key, relative to the vault.
    pub key: PathBuf,
    pub kid: String,
    pub signer: String,
    pub holder: String,
    pub audience: String,
    /// Token files relative to the store, in presentation order.
    pub credentials: Vec<PathBuf>,
}

/// API for service information.
#[async_trait]
pub trait OnboarderInfoAPI {
    /// Fetches service information.
    async fn fetch_info(
        ctx: &OnboarderContext,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        ctx.check_out(Artifact::Document, out)?;
        let response = ctx.dispatch(build(&FetchInfo)?).await?;
        ctx.persist(Artifact::Document, response, out)
    }
}

/// API for key creation.
#[async_trait]
pub trait OnboarderKeyAPI {
    /// Requests a new key from the service, saving it to the vault when `out` is given.
    async fn create_key(
        ctx: &OnboarderContext,
        alg: KeyAlgorithm,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        ctx.check_out(Artifact::Key, out)?;
        let response = ctx.dispatch(build(&CreateKey { alg })?).await?;
        ctx.persist(Artifact::Key, response, out)
    }
}

/// API for DID creation and resolution.
#[async_trait]
pub trait OnboarderDIDAPI {
    /// Creates a DID from the public projection of a vault key.
    async fn create_did(
        ctx: &OnboarderContext,
        key: &Path,
        method: DidMethod,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        ctx.check_out(Artifact::Did, out)?;
        let jwk = ctx.vault.read_key(key)?;
        let response = ctx.dispatch(build(&CreateDid::new(method, &jwk))?).await?;
        ctx.persist(Artifact::Did, response, out)
    }

    /// Resolves a DID. The resolution result is saved as returned.
    async fn resolve_did(
        ctx: &OnboarderContext,
        did: &str,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        require_did("Resolved", did)?;
        ctx.check_out(Artifact::Document, out)?;
        let request = build(&ResolveDid {
            did: did.to_string(),
        })?;
        let response = ctx.dispatch(request).await?;
        ctx.persist(Artifact::Document, response, out)
    }
}

/// API for VC issuance and verification.
#[async_trait]
pub trait OnboarderVCAPI {
    /// Issues a VC signed with the full issuer key.
    async fn issue_vc(
        ctx: &OnboarderContext,
        issuance: &VcIssuance,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        let claims = assemble_from_file(issuance.claims_json.as_deref(), &issuance.claims)?;
        require_did("Issuer", &issuance.issuer)?;
        require_did("Subject", &issuance.subject)?;
        ctx.check_out(Artifact::Token, out)?;
        let jwk = ctx.read_signing_key(&issuance.key)?;

        let request = build(&IssueVc {
            issuer: SigningIdentity::new(&issuance.issuer, &jwk, &issuance.kid),
            subject: Party::new(&issuance.subject),
            claims,
        })?;
        let response = ctx.dispatch(request).await?;
        ctx.persist(Artifact::Token, response, out)
    }

    /// Verifies a VC token read from the store.
    async fn verify_vc(
        ctx: &OnboarderContext,
        token_file: &Path,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        ctx.check_out(Artifact::Document, out)?;
        let token = ctx.store.read_token(token_file)?;
        let response = ctx.dispatch(build(&VerifyVc { token })?).await?;
        ctx.persist(Artifact::Document, response, out)
    }
}

/// API for VP issuance and verification.
#[async_trait]
pub trait OnboarderVPAPI {
    /// Issues a VP bundling the credential tokens in the order given.
    async fn issue_vp(
        ctx: &OnboarderContext,
        issuance: &VpIssuance,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        if issuance.credentials.is_empty() {
            return Err(OnboarderAPIError::Validation(
                "At least one credential file is required.".to_string(),
            ));
        }
        require_did("Signer", &issuance.signer)?;
        require_did("Holder", &issuance.holder)?;
        require_did("Audience", &issuance.audience)?;
        ctx.check_out(Artifact::Token, out)?;
        let jwk = ctx.read_signing_key(&issuance.key)?;
        let credentials = ctx.store.read_tokens(&issuance.credentials)?;

        let request = build(&IssueVp {
            signer: SigningIdentity::new(&issuance.signer, &jwk, &issuance.kid),
            holder: Party::new(&issuance.holder),
            audience: Party::new(&issuance.audience),
            credentials,
        })?;
        let response = ctx.dispatch(request).await?;
        ctx.persist(Artifact::Token, response, out)
    }

    /// Verifies a VP token read from the store for the given audience.
    async fn verify_vp(
        ctx: &OnboarderContext,
        token_file: &Path,
        audience: &str,
        out: Option<&Path>,
    ) -> Result<Outcome, OnboarderAPIError> {
        require_did("Audience", audience)?;
        ctx.check_out(Artifact::Document, out)?;
        let token = ctx.store.read_token(token_file)?;
        let request = build(&VerifyVp {
            token,
            audience: Party::new(audience),
        })?;
        let response = ctx.dispatch(request).await?;
        ctx.persist(Artifact::Document, response, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{MockHttpClient, Response, StatusCode};
    use crate::OnboarderAPI;
    use onboarder_core::claims::ClaimsError;
    use onboarder_core::data::{
        TEST_EC_JWK, TEST_EC_PUBLIC_JWK, TEST_ISSUER_DID, TEST_KID, TEST_RESOLUTION_RESULT,
        TEST_SUBJECT_DID, TEST_VC_TOKEN, TEST_VC_TOKEN_2,
    };
    use onboarder_core::key_manager::KeyManagerError;
    use onboarder_core::request::Method;
    use serde_json::json;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn context(tempdir: &TempDir, client: MockHttpClient) -> OnboarderContext {
        let config = OnboarderConfig {
            vault_dir: tempdir.path().join("vault").to_string_lossy().into_owned(),
            storage_dir: tempdir.path().join("storage").to_string_lossy().into_owned(),
            ..Default::default()
        };
        OnboarderContext::new(&config, Box::new(client)).unwrap()
    }

    fn no_requests() -> MockHttpClient {
        let mut client = MockHttpClient::new();
        client.expect_send().times(0);
        client
    }

    fn responding(status: u16, body: Value) -> MockHttpClient {
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(1)
            .returning(move |_, _, _| Ok(Response::new(status, body.to_string())));
        client
    }

    fn save_issuer_key(ctx: &OnboarderContext, name: &str) {
        let key: Jwk = serde_json::from_str(TEST_EC_JWK).unwrap();
        ctx.vault().save_key(Path::new(name), &key).unwrap();
    }

    fn vc_issuance() -> VcIssuance {
        VcIssuance {
            key: PathBuf::from("issuer.json"),
            kid: TEST_KID.to_string(),
            issuer: TEST_ISSUER_DID.to_string(),
            subject: TEST_SUBJECT_DID.to_string(),
            claims_json: None,
            claims: vec!["name=Jane".to_string()],
        }
    }

    fn vp_issuance(credentials: &[&str]) -> VpIssuance {
        VpIssuance {
            key: PathBuf::from("holder.json"),
            kid: TEST_KID.to_string(),
            signer: TEST_SUBJECT_DID.to_string(),
            holder: TEST_SUBJECT_DID.to_string(),
            audience: TEST_ISSUER_DID.to_string(),
            credentials: credentials.iter().map(PathBuf::from).collect(),
        }
    }

    #[tokio::test]
    async fn test_fetch_info() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(1)
            .returning(|method, url, body| {
                assert_eq!(method, Method::Get);
                assert_eq!(url, "http://localhost:3000/info/");
                assert!(body.is_none());
                Ok(Response::new(200, r#"{"name": "onboarding"}"#))
            });
        let ctx = context(&tempdir, client);

        let outcome = OnboarderAPI::fetch_info(&ctx, None).await.unwrap();
        assert_eq!(outcome.response, json!({"name": "onboarding"}));
        assert_eq!(outcome.saved_to, None);
    }

    #[tokio::test]
    async fn test_create_key_saves_to_vault() {
        let tempdir = tempfile::tempdir().unwrap();
        let jwk: Value = serde_json::from_str(TEST_EC_JWK).unwrap();
        let ctx = context(&tempdir, responding(200, json!({ "jwk": jwk })));

        let outcome =
            OnboarderAPI::create_key(&ctx, KeyAlgorithm::Secp256k1, Some(Path::new("issuer.json")))
                .await
                .unwrap();
        assert_eq!(
            outcome.saved_to,
            Some(tempdir.path().join("vault").join("issuer.json"))
        );
        let saved = ctx.vault().read_key(Path::new("issuer.json")).unwrap();
        assert_eq!(serde_json::to_value(&saved).unwrap(), jwk);
        assert!(!tempdir.path().join("storage").exists());
    }

    #[tokio::test]
    async fn test_create_key_out_checked_before_dispatch() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, no_requests());

        let result =
            OnboarderAPI::create_key(&ctx, KeyAlgorithm::Rsa, Some(Path::new("../storage/key.json")))
                .await;
        assert!(matches!(
            result,
            Err(OnboarderAPIError::KeyManager(KeyManagerError::OutsideVault(_)))
        ));
    }

    #[tokio::test]
    async fn test_create_did_sends_public_projection() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(1)
            .returning(|method, url, body| {
                assert_eq!(method, Method::Post);
                assert_eq!(url, "http://localhost:3000/create-did/");
                let body = body.unwrap();
                let expected: Value = serde_json::from_str(TEST_EC_PUBLIC_JWK).unwrap();
                assert_eq!(body["publicJwk"], expected);
                assert!(body["publicJwk"].get("d").is_none());
                Ok(Response::new(200, format!(r#"{{"did": "{TEST_SUBJECT_DID}"}}"#)))
            });
        let ctx = context(&tempdir, client);
        save_issuer_key(&ctx, "issuer.json");

        let outcome = OnboarderAPI::create_did(
            &ctx,
            Path::new("issuer.json"),
            DidMethod::Key,
            Some(Path::new("subject.did")),
        )
        .await
        .unwrap();
        let path = outcome.saved_to.unwrap();
        assert_eq!(path, tempdir.path().join("storage").join("subject.did"));
        assert_eq!(fs::read_to_string(path).unwrap(), format!("{TEST_SUBJECT_DID}\n"));
    }

    #[tokio::test]
    async fn test_create_did_missing_key() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, no_requests());

        let result =
            OnboarderAPI::create_did(&ctx, Path::new("absent.json"), DidMethod::Ebsi, None).await;
        assert!(matches!(
            result,
            Err(OnboarderAPIError::KeyManager(KeyManagerError::FailedToLoadKey { .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_artifact_writes_nothing() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, responding(200, json!({"status": "created"})));
        save_issuer_key(&ctx, "issuer.json");

        let result = OnboarderAPI::create_did(
            &ctx,
            Path::new("issuer.json"),
            DidMethod::Key,
            Some(Path::new("subject.did")),
        )
        .await;
        match result {
            Err(err @ OnboarderAPIError::MissingArtifact { artifact: "DID", .. }) => {
                assert!(err.response_body().unwrap().contains("created"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!tempdir.path().join("storage").join("subject.did").exists());
    }

    #[tokio::test]
    async fn test_create_key_whole_body() {
        let tempdir = tempfile::tempdir().unwrap();
        let jwk: Value = serde_json::from_str(TEST_EC_JWK).unwrap();
        let ctx = context(&tempdir, responding(200, jwk.clone()));

        let outcome =
            OnboarderAPI::create_key(&ctx, KeyAlgorithm::Secp256k1, Some(Path::new("issuer.json")))
                .await
                .unwrap();
        assert_eq!(outcome.response, jwk);
        let saved = ctx.vault().read_key(Path::new("issuer.json")).unwrap();
        assert_eq!(serde_json::to_value(&saved).unwrap(), jwk);
    }

    #[tokio::test]
    async fn test_create_key_missing_key() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, responding(200, json!({"status": "ok"})));

        let result =
            OnboarderAPI::create_key(&ctx, KeyAlgorithm::Rsa, Some(Path::new("issuer.json"))).await;
        assert!(matches!(
            result,
            Err(OnboarderAPIError::MissingArtifact { artifact: "key", .. })
        ));
        assert!(!tempdir.path().join("vault").join("issuer.json").exists());
    }

    #[tokio::test]
    async fn test_create_key_unsupported_key_type() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, responding(200, json!({"jwk": {"kty": "OKP"}})));

        let result =
            OnboarderAPI::create_key(&ctx, KeyAlgorithm::Rsa, Some(Path::new("issuer.json"))).await;
        match result {
            Err(OnboarderAPIError::PersistFailed { source, .. }) => {
                assert!(matches!(*source, OnboarderAPIError::Jwk(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!tempdir.path().join("vault").join("issuer.json").exists());
    }

    #[tokio::test]
    async fn test_issue_vc_missing_token() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, responding(200, json!({"status": "ok"})));
        save_issuer_key(&ctx, "issuer.json");

        let result = OnboarderAPI::issue_vc(&ctx, &vc_issuance(), Some(Path::new("vc.jwt"))).await;
        assert!(matches!(
            result,
            Err(OnboarderAPIError::MissingArtifact { artifact: "token", .. })
        ));
        assert!(!tempdir.path().join("storage").join("vc.jwt").exists());
    }

    #[tokio::test]
    async fn test_verbose_dispatch_sends_full_key() {
        let tempdir = tempfile::tempdir().unwrap();
        let key: Value = serde_json::from_str(TEST_EC_JWK).unwrap();
        let d = key["d"].clone();
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(1)
            .returning(move |_, _, body| {
                assert_eq!(body.unwrap()["issuer"]["jwk"]["d"], d);
                Ok(Response::new(200, format!(r#"{{"token": "{TEST_VC_TOKEN}"}}"#)))
            });
        let ctx = context(&tempdir, client).verbose(true);
        save_issuer_key(&ctx, "issuer.json");

        let outcome = OnboarderAPI::issue_vc(&ctx, &vc_issuance(), None).await.unwrap();
        assert_eq!(outcome.response["token"], TEST_VC_TOKEN);

        let jwk = ctx.read_signing_key(Path::new("issuer.json")).unwrap();
        let request = build(&IssueVc {
            issuer: SigningIdentity::new(TEST_ISSUER_DID, &jwk, TEST_KID),
            subject: Party::new(TEST_SUBJECT_DID),
            claims: Default::default(),
        })
        .unwrap();
        assert_eq!(request.body.as_ref().unwrap()["issuer"]["jwk"]["d"], key["d"]);
        assert_eq!(request.redacted_body().unwrap()["issuer"]["jwk"]["d"], "***");
    }

    #[tokio::test]
    async fn test_resolve_did_saves_document() {
        let tempdir = tempfile::tempdir().unwrap();
        let resolution: Value = serde_json::from_str(TEST_RESOLUTION_RESULT).unwrap();
        let ctx = context(&tempdir, responding(200, resolution.clone()));

        let outcome =
            OnboarderAPI::resolve_did(&ctx, TEST_ISSUER_DID, Some(Path::new("issuer.json")))
                .await
                .unwrap();
        assert_eq!(outcome.response, resolution);
        let saved: Value =
            serde_json::from_str(&fs::read_to_string(outcome.saved_to.unwrap()).unwrap()).unwrap();
        assert_eq!(saved, resolution);
    }

    #[tokio::test]
    async fn test_resolve_empty_did() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, no_requests());
        assert!(matches!(
            OnboarderAPI::resolve_did(&ctx, " ", None).await,
            Err(OnboarderAPIError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_issue_vc_without_claims_sends_nothing() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, no_requests());
        save_issuer_key(&ctx, "issuer.json");

        let issuance = VcIssuance {
            claims: vec![],
            ..vc_issuance()
        };
        let result = OnboarderAPI::issue_vc(&ctx, &issuance, Some(Path::new("vc.jwt"))).await;
        assert!(matches!(
            result,
            Err(OnboarderAPIError::Claims(ClaimsError::NoClaimsProvided))
        ));
        assert!(!tempdir.path().join("storage").exists());
    }

    #[tokio::test]
    async fn test_issue_vc_rejects_public_key() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, no_requests());
        let public_key: Jwk = serde_json::from_str(TEST_EC_PUBLIC_JWK).unwrap();
        ctx.vault()
            .save_key(Path::new("issuer.json"), &public_key)
            .unwrap();

        let result = OnboarderAPI::issue_vc(&ctx, &vc_issuance(), None).await;
        assert!(matches!(result, Err(OnboarderAPIError::Jwk(JwkError::NotPrivate))));
    }

    #[tokio::test]
    async fn test_remote_failure_writes_nothing() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, responding(400, json!({"detail": "unknown issuer"})));
        save_issuer_key(&ctx, "issuer.json");

        let result = OnboarderAPI::issue_vc(&ctx, &vc_issuance(), Some(Path::new("vc.jwt"))).await;
        match result {
            Err(err @ OnboarderAPIError::RemoteFailure { .. }) => {
                assert!(matches!(
                    err,
                    OnboarderAPIError::RemoteFailure {
                        status: StatusCode(400),
                        ..
                    }
                ));
                assert!(err.response_body().unwrap().contains("unknown issuer"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!tempdir.path().join("storage").join("vc.jwt").exists());
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_response() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, responding(200, json!({ "token": TEST_VC_TOKEN })));
        save_issuer_key(&ctx, "issuer.json");
        // A directory in place of the output file makes the final rename fail
        fs::create_dir_all(tempdir.path().join("storage").join("vc.jwt").join("inner")).unwrap();

        let result = OnboarderAPI::issue_vc(&ctx, &vc_issuance(), Some(Path::new("vc.jwt"))).await;
        match result {
            Err(OnboarderAPIError::PersistFailed { response, .. }) => {
                assert_eq!(response["token"], json!(TEST_VC_TOKEN));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_issue_vc_then_verify_round_trip() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(2)
            .returning(|_, url, body| match url {
                "http://localhost:3000/issue-vc/" => {
                    let body = body.unwrap();
                    assert_eq!(body["claims"], json!({"name": "Jane"}));
                    assert!(body["issuer"]["jwk"]["d"].is_string());
                    Ok(Response::new(200, format!(r#"{{"token": "{TEST_VC_TOKEN}"}}"#)))
                }
                "http://localhost:3000/verify-vc/" => {
                    assert_eq!(body.unwrap(), json!({ "token": TEST_VC_TOKEN }));
                    Ok(Response::new(200, r#"{"valid": true}"#))
                }
                other => panic!("unexpected url: {other}"),
            });
        let ctx = context(&tempdir, client);
        save_issuer_key(&ctx, "issuer.json");

        OnboarderAPI::issue_vc(&ctx, &vc_issuance(), Some(Path::new("vc/degree.jwt")))
            .await
            .unwrap();
        let outcome = OnboarderAPI::verify_vc(
            &ctx,
            Path::new("vc/degree.jwt"),
            Some(Path::new("vc/degree.verification.json")),
        )
        .await
        .unwrap();
        assert_eq!(outcome.response, json!({"valid": true}));
        assert!(tempdir
            .path()
            .join("storage/vc/degree.verification.json")
            .is_file());
    }

    #[tokio::test]
    async fn test_issue_vc_plain_token_body() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(1)
            .returning(|_, _, _| Ok(Response::new(200, TEST_VC_TOKEN)));
        let ctx = context(&tempdir, client);
        save_issuer_key(&ctx, "issuer.json");

        let outcome = OnboarderAPI::issue_vc(&ctx, &vc_issuance(), Some(Path::new("vc.jwt")))
            .await
            .unwrap();
        assert_eq!(outcome.response, json!(TEST_VC_TOKEN));
        assert_eq!(
            ctx.store().read_token(Path::new("vc.jwt")).unwrap(),
            TEST_VC_TOKEN
        );
    }

    #[tokio::test]
    async fn test_issue_vp_without_credentials_sends_nothing() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, no_requests());
        save_issuer_key(&ctx, "holder.json");

        let result = OnboarderAPI::issue_vp(&ctx, &vp_issuance(&[]), None).await;
        assert!(matches!(result, Err(OnboarderAPIError::Validation(_))));
    }

    #[tokio::test]
    async fn test_issue_vp_credential_order() {
        for order in [["f1", "f2"], ["f2", "f1"]] {
            let tempdir = tempfile::tempdir().unwrap();
            let sent = Arc::new(Mutex::new(Vec::new()));
            let captured = Arc::clone(&sent);
            let mut client = MockHttpClient::new();
            client
                .expect_send()
                .times(1)
                .returning(move |_, _, body| {
                    captured.lock().unwrap().push(body.unwrap());
                    Ok(Response::new(200, r#"{"token": "vp"}"#))
                });
            let ctx = context(&tempdir, client);
            save_issuer_key(&ctx, "holder.json");
            ctx.store()
                .write_token(Path::new("f1"), TEST_VC_TOKEN)
                .unwrap();
            ctx.store()
                .write_token(Path::new("f2"), TEST_VC_TOKEN_2)
                .unwrap();

            OnboarderAPI::issue_vp(&ctx, &vp_issuance(&order), None)
                .await
                .unwrap();

            let expected: Vec<&str> = order
                .iter()
                .map(|name| if *name == "f1" { TEST_VC_TOKEN } else { TEST_VC_TOKEN_2 })
                .collect();
            let body = sent.lock().unwrap().remove(0);
            assert_eq!(body["credentials"], json!(expected));
            assert_eq!(body["holder"], json!({ "did": TEST_SUBJECT_DID }));
            assert_eq!(body["audience"], json!({ "did": TEST_ISSUER_DID }));
        }
    }

    #[tokio::test]
    async fn test_issue_vp_missing_credential_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let ctx = context(&tempdir, no_requests());
        save_issuer_key(&ctx, "holder.json");

        let result = OnboarderAPI::issue_vp(&ctx, &vp_issuance(&["absent.jwt"]), None).await;
        assert!(matches!(result, Err(OnboarderAPIError::Store(_))));
    }

    #[tokio::test]
    async fn test_verify_vp() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut client = MockHttpClient::new();
        client
            .expect_send()
            .times(1)
            .returning(|_, url, body| {
                assert_eq!(url, "http://localhost:3000/verify-vp/");
                assert_eq!(
                    body.unwrap(),
                    json!({"token": TEST_VC_TOKEN, "audience": {"did": TEST_ISSUER_DID}})
                );
                Ok(Response::new(200, r#"{"valid": true}"#))
            });
        let ctx = context(&tempdir, client);
        ctx.store()
            .write_token(Path::new("vp.jwt"), TEST_VC_TOKEN)
            .unwrap();

        let outcome = OnboarderAPI::verify_vp(&ctx, Path::new("vp.jwt"), TEST_ISSUER_DID, None)
            .await
            .unwrap();
        assert_eq!(outcome.response, json!({"valid": true}));
    }

    #[test]
    fn test_overlapping_stores_rejected() {
        let tempdir = tempfile::tempdir().unwrap();
        let config = OnboarderConfig {
            vault_dir: tempdir.path().to_string_lossy().into_owned(),
            storage_dir: tempdir.path().join("storage").to_string_lossy().into_owned(),
            ..Default::default()
        };
        assert!(matches!(
            OnboarderContext::new(&config, Box::new(no_requests())),
            Err(OnboarderAPIError::Config(_))
        ));
    }
}
