//! Mock implementations of platform traits and token helpers for testing

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::SessionSettings;
use crate::error::{Result, SessionError};
use crate::oidc::{IdToken, Provider};
use crate::platform::{Cache, Clock, Environment, HttpClient, HttpResponse};
use crate::session::SessionManager;

pub const TEST_TIMESTAMP: u64 = 1706900000;

pub const TEST_KID: &str = "test-key-1";

/// Mock cache backed by an in-memory HashMap
pub struct MockCache {
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockCache {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MockCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.store.lock().unwrap();
        Ok(store.get(key).cloned())
    }

    async fn put_bytes(&self, key: &str, value: &[u8], _ttl_secs: u64) -> Result<()> {
        self.store.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Mock HTTP client with pre-configured responses, recording requested URLs
pub struct MockHttp {
    responses: Vec<(String, HttpResponse)>,
    requests: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn new(responses: Vec<(String, HttpResponse)>) -> Self {
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        for (pattern, response) in &self.responses {
            if url.contains(pattern) {
                return Ok(HttpResponse {
                    status: response.status,
                    body: response.body.clone(),
                });
            }
        }
        Err(SessionError::upstream(format!("no mock response for GET {}", url)))
    }
}

/// Mock clock starting at a fixed timestamp
pub struct MockClock(AtomicU64);

impl MockClock {
    pub fn new(now_secs: u64) -> Self {
        Self(AtomicU64::new(now_secs))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_secs(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mock environment backed by an in-memory HashMap
pub struct MockEnv {
    vars: HashMap<String, String>,
    secrets: HashMap<String, String>,
}

impl MockEnv {
    pub fn new(vars: HashMap<String, String>, secrets: HashMap<String, String>) -> Self {
        Self { vars, secrets }
    }
}

impl Environment for MockEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::configuration(format!("variable '{}' not found", name)))
    }

    fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::configuration(format!("secret '{}' not found", name)))
    }
}

/// Provider that records calls and either trusts the payload or refuses
pub struct MockProvider {
    accept: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockProvider {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// (audience, token) pairs seen so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn verify(&self, audience: &str, token: &str) -> Result<IdToken> {
        self.calls
            .lock()
            .unwrap()
            .push((audience.to_string(), token.to_string()));

        if self.accept {
            Ok(IdToken::new(decode_segment(token, 1)))
        } else {
            Err(SessionError::provider("rejected by mock provider"))
        }
    }
}

/// Manager with secret `secret`, issuer `argocd` and a fixed clock
pub fn local_manager() -> SessionManager {
    local_manager_with(SessionSettings::new("secret", "argocd"))
}

pub fn local_manager_with(settings: SessionSettings) -> SessionManager {
    manager_with_clock(settings, Arc::new(MockClock::new(TEST_TIMESTAMP)))
}

pub fn manager_with_clock(settings: SessionSettings, clock: Arc<MockClock>) -> SessionManager {
    SessionManager::new(
        settings,
        Arc::new(MockHttp::new(Vec::new())),
        Arc::new(MockCache::new()),
        clock,
    )
    .expect("test settings should be valid")
}

/// Build `header.claims.` with an empty signature segment
pub fn unsigned_token(header: serde_json::Value, claims: serde_json::Value) -> String {
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap()),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap()),
    )
}

/// Decode one base64url JSON segment of a token
pub fn decode_segment(token: &str, index: usize) -> serde_json::Value {
    let segment = token.split('.').nth(index).expect("segment should exist");
    let bytes = URL_SAFE_NO_PAD.decode(segment).expect("segment should be valid base64");
    serde_json::from_slice(&bytes).expect("segment should be valid JSON")
}

/// RSA key pair standing in for the identity provider's signing key
pub struct TestRsaKey {
    pub private_pem: String,
    n: String,
    e: String,
}

impl TestRsaKey {
    /// JWKS document publishing the public half under [`TEST_KID`]
    pub fn jwks(&self) -> serde_json::Value {
        serde_json::json!({
            "keys": [{
                "kty": "RSA",
                "use": "sig",
                "alg": "RS256",
                "kid": TEST_KID,
                "n": self.n,
                "e": self.e,
            }]
        })
    }
}

/// Generate a fresh RSA key pair once per test run (never touches disk)
pub fn test_rsa_key() -> &'static TestRsaKey {
    static KEY: OnceLock<TestRsaKey> = OnceLock::new();

    KEY.get_or_init(|| {
        use rand::rngs::OsRng;
        use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
        use rsa::traits::PublicKeyParts;
        use rsa::RsaPrivateKey;

        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation failed");
        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private key PEM export failed")
            .to_string();

        TestRsaKey {
            private_pem,
            n: URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        }
    })
}

/// Sign `claims` as the identity provider would
pub fn sign_rs256(claims: &serde_json::Value, kid: &str) -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(test_rsa_key().private_pem.as_bytes())
        .expect("private key should be valid");

    encode(&header, claims, &key).expect("signing should succeed")
}

/// Discovery document and JWKS responses for `issuer`
pub fn oidc_responses(issuer: &str, jwks: &serde_json::Value) -> Vec<(String, HttpResponse)> {
    let discovery = serde_json::json!({
        "issuer": issuer,
        "jwks_uri": format!("{}/keys", issuer),
        "id_token_signing_alg_values_supported": ["RS256"],
    });

    vec![
        (
            "/.well-known/openid-configuration".to_string(),
            HttpResponse {
                status: 200,
                body: serde_json::to_vec(&discovery).unwrap(),
            },
        ),
        (
            "/keys".to_string(),
            HttpResponse {
                status: 200,
                body: serde_json::to_vec(jwks).unwrap(),
            },
        ),
    ]
}
