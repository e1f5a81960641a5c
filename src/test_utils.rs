//! Shared test helpers: signing fixtures, key sources, and a router harness.
//!
//! Two RSA key pairs live under `fixtures/`:
//! - "trusted": published as `TRUSTED_KID`
//! - "foreign": published as `SECONDARY_KID` only; `FOREIGN_KID` names the same
//!   key but is absent from the default key set (used for rotation tests)

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http_body_util::BodyExt;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Map, Value, json};
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use url::Url;
use wiremock::MockServer;

use crate::app::build_router;
use crate::repos::Ingredient;
use crate::repos::drink_repo::memory::MemoryDrinkStore;
use crate::services::auth::{
    AuthService, KeyProvider, KeyProviderError, RemoteKeyProvider, TokenVerifier,
};
use crate::state::AppState;

pub const ISSUER: &str = "https://coffee-shop.example.com/";
pub const AUDIENCE: &str = "drinks";
pub const TRUSTED_KID: &str = "trusted-key";
pub const SECONDARY_KID: &str = "secondary-key";
pub const FOREIGN_KID: &str = "foreign-key";

/// Fixed clock for verifier tests (2023-11-14T22:13:20Z).
pub const NOW: u64 = 1_700_000_000;

const TRUSTED_PEM: &str = include_str!("../fixtures/trusted_signing_key.pem");
const FOREIGN_PEM: &str = include_str!("../fixtures/foreign_signing_key.pem");

const TRUSTED_N: &str = "tXVI1rUbvsEYd-E2f1wDOnhGQAOmhKz6fNpPTsCEb1APDngKKiJg3uglDL6d-6hiaD9YFIpsPD-stI16c1I6EKYBbrY8oPjZHQDi2Xku652irbgJwxeOTeqvAqcpZ3kyyCXaN9mt_nouivOy5Jd1NKyK5nyHbe0n69bkzMvfGer1v9BX3856QY8PYUk1jFHaWPoPhrogbBIf5I0y8CJbelnTFr24xAmmvssQHFtMTDOQuMQhxB2Cz2gY7qKwswegQ7AaBJXtEpUqhtrYiXOTbmT9lKaMZTsr6ZoVvOoUvSP-k15NgtVl5iuE3svOgo6X2HLcdDHyIZ-YZ7E24zidEw";
const FOREIGN_N: &str = "xNBo30YDGnXzqicunYQHbWxTkExhmR3xItFvecbyuuZtkY8L2JhVHdk-Sm7G36E285G7N6ExAW9y3obHBk4HR8T8BoYhrw9Xd5SrTl38ZSOSbTgX3OlOpZvOPBjbH4c5Jh2v6qhB5mEXmfIiDalnVPyCnlmNb_42Y8M2KWeUVdKeDRgWf0A9s9K7jaSsF4rqQxrmLmjgXXlMVKz5AZenV8dy7jctxH_yWVz0Y-Th49HkonNJ3-P3biHKOXFptyZSpK--rSoVUdOO7gPc_AbvaQcYemWZOuLovjr9PsrWeUmfYd9VBICRqNFxYVFsMTLnM1wUEdqcf31R6YTcsCdQ9Q";

fn rsa_jwk(kid: &str, n: &str) -> Value {
    json!({
        "kty": "RSA",
        "use": "sig",
        "alg": "RS256",
        "kid": kid,
        "n": n,
        "e": "AQAB"
    })
}

/// The document the identity provider publishes: trusted + secondary keys.
pub fn jwks_document() -> Value {
    json!({
        "keys": [rsa_jwk(TRUSTED_KID, TRUSTED_N), rsa_jwk(SECONDARY_KID, FOREIGN_N)]
    })
}

pub fn jwks() -> JwkSet {
    serde_json::from_value(jwks_document()).unwrap()
}

/// Key set after a rotation published `FOREIGN_KID`.
pub fn jwks_with_foreign() -> JwkSet {
    let mut doc = jwks_document();
    doc["keys"]
        .as_array_mut()
        .unwrap()
        .push(rsa_jwk(FOREIGN_KID, FOREIGN_N));
    serde_json::from_value(doc).unwrap()
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

/// Builds signed tokens. Defaults: trusted key, RS256, `TRUSTED_KID`,
/// valid issuer/audience, one hour of lifetime, empty permissions.
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    claims: Map<String, Value>,
    issued_at: u64,
    kid: Option<String>,
    algorithm: Algorithm,
    pem: &'static str,
}

impl TokenBuilder {
    /// Claims relative to the fixed `NOW`.
    pub fn new() -> Self {
        Self::at(NOW)
    }

    /// Claims relative to the real clock (for router-level tests).
    pub fn live() -> Self {
        Self::at(unix_now())
    }

    fn at(issued_at: u64) -> Self {
        let claims = json!({
            "iss": ISSUER,
            "aud": AUDIENCE,
            "sub": "auth0|barista",
            "iat": issued_at,
            "exp": issued_at + 3600,
            "permissions": []
        });
        let Value::Object(claims) = claims else {
            unreachable!()
        };

        Self {
            claims,
            issued_at,
            kid: Some(TRUSTED_KID.to_string()),
            algorithm: Algorithm::RS256,
            pem: TRUSTED_PEM,
        }
    }

    pub fn permissions(self, permissions: &[&str]) -> Self {
        self.set("permissions", json!(permissions))
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.claims.insert(key.to_string(), value);
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.claims.remove(key);
        self
    }

    pub fn expires_at(self, exp: u64) -> Self {
        self.set("exp", json!(exp))
    }

    /// Negative values produce an already expired token.
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = self.issued_at as i64 + seconds;
        self.set("exp", json!(exp))
    }

    pub fn kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// Sign with the foreign private key (kid is left as is).
    pub fn foreign_key(mut self) -> Self {
        self.pem = FOREIGN_PEM;
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    fn header(&self, algorithm: Algorithm) -> Header {
        let mut header = Header::new(algorithm);
        header.kid = self.kid.clone();
        header
    }

    pub fn sign(&self) -> String {
        let key = EncodingKey::from_rsa_pem(self.pem.as_bytes()).unwrap();
        jsonwebtoken::encode(&self.header(self.algorithm), &self.claims, &key).unwrap()
    }

    /// Sign an arbitrary payload (e.g. one that is not a claim object).
    pub fn sign_payload(&self, payload: &Value) -> String {
        let key = EncodingKey::from_rsa_pem(self.pem.as_bytes()).unwrap();
        jsonwebtoken::encode(&self.header(self.algorithm), payload, &key).unwrap()
    }

    pub fn sign_hs256(&self, secret: &[u8]) -> String {
        let key = EncodingKey::from_secret(secret);
        jsonwebtoken::encode(&self.header(Algorithm::HS256), &self.claims, &key).unwrap()
    }
}

/// `alg: none` token with an empty signature segment.
pub fn unsigned_token(kid: &str, claims: &Value) -> String {
    let header = json!({"alg": "none", "typ": "JWT", "kid": kid});
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Replace one base64url character of `segment` (0 header, 1 payload, 2 signature).
pub fn mutate_segment(token: &str, segment: usize, index: usize) -> String {
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let mut chars: Vec<char> = parts[segment].chars().collect();
    chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
    parts[segment] = chars.into_iter().collect();
    parts.join(".")
}

/// In-process key source. Starts at the first set; each `invalidate` moves
/// to the next one (staying on the last). No sets = source unavailable.
#[derive(Debug, Default)]
pub struct StaticKeys {
    sets: Vec<Arc<JwkSet>>,
    position: AtomicUsize,
    fetches: AtomicUsize,
    invalidations: AtomicUsize,
}

impl StaticKeys {
    pub fn new(sets: Vec<JwkSet>) -> Self {
        Self {
            sets: sets.into_iter().map(Arc::new).collect(),
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Arc<JwkSet> {
        let last = self.sets.len().saturating_sub(1);
        let position = self.position.load(Ordering::SeqCst).min(last);
        Arc::clone(&self.sets[position])
    }
}

#[async_trait]
impl KeyProvider for StaticKeys {
    async fn fetch_keys(&self) -> Result<Arc<JwkSet>, KeyProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.sets.is_empty() {
            return Err(KeyProviderError::Status(503));
        }
        Ok(self.current())
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.position.fetch_add(1, Ordering::SeqCst);
    }
}

fn verifier() -> TokenVerifier {
    TokenVerifier::new(ISSUER, AUDIENCE, vec![Algorithm::RS256], 0)
}

fn state_with(keys: Arc<dyn KeyProvider>, store: Arc<MemoryDrinkStore>) -> AppState {
    AppState::new(store, Arc::new(AuthService::new(keys, verifier())))
}

pub fn test_state(keys: Arc<StaticKeys>, store: Arc<MemoryDrinkStore>) -> AppState {
    state_with(keys, store)
}

fn ingredient(name: &str, color: &str, parts: u32) -> Ingredient {
    Ingredient {
        name: name.into(),
        color: color.into(),
        parts,
    }
}

/// Everything logged on the current thread while the returned guard is alive.
///
/// ```ignore
/// let (logs, _guard) = CapturedLogs::start();
/// // ... drive the router ...
/// assert!(!logs.contents().contains("secret"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn start() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Status, headers and buffered body of a router response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub async fn send(app: &Router, request: Request<Body>) -> Self {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        Self {
            status,
            headers,
            body,
        }
    }

    pub fn assert_ok(&self) {
        self.assert_status(200);
    }

    pub fn assert_status(&self, expected: u16) {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "unexpected status, body: {}",
            String::from_utf8_lossy(&self.body)
        );
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// The full router over an in-memory store seeded with "water" and "coffee".
///
/// `keys` counts fetches for the default fixture; a fixture built with
/// `with_remote_keys` verifies against the mock server instead and `keys`
/// stays untouched.
pub struct TestFixture {
    pub app: Router,
    pub store: Arc<MemoryDrinkStore>,
    pub keys: Arc<StaticKeys>,
}

impl TestFixture {
    pub async fn new() -> Self {
        let keys = Arc::new(StaticKeys::new(vec![jwks()]));
        Self::build(keys.clone(), keys)
    }

    /// Keys come from `<server>/.well-known/jwks.json` through the real provider.
    pub async fn with_remote_keys(server: &MockServer) -> Self {
        let url = Url::parse(&format!("{}/.well-known/jwks.json", server.uri())).unwrap();
        let remote =
            RemoteKeyProvider::new(url, Duration::from_secs(60), Duration::from_secs(2)).unwrap();
        Self::build(Arc::new(remote), Arc::new(StaticKeys::unavailable()))
    }

    fn build(provider: Arc<dyn KeyProvider>, keys: Arc<StaticKeys>) -> Self {
        Self::setup_logger();

        let store = Arc::new(MemoryDrinkStore::seeded(&[
            ("water", vec![ingredient("water", "blue", 1)]),
            ("coffee", vec![ingredient("coffee", "brown", 1)]),
        ]));
        let app = build_router(state_with(provider, store.clone()));

        Self { app, store, keys }
    }

    pub fn setup_logger() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        TestResponse::send(&self.app, request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(self.request(Method::GET, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.send(self.request(Method::POST, uri, token, Some(body)))
            .await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.send(self.request(Method::PATCH, uri, token, Some(body)))
            .await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(self.request(Method::DELETE, uri, token, None))
            .await
    }

    pub async fn put(&self, uri: &str) -> TestResponse {
        self.send(self.request(Method::PUT, uri, None, None)).await
    }
}
