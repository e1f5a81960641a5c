//! Bearer token (JWT) verification against a signing key set.
//!
//! Order matters and nothing is skipped:
//! 1. shape (three segments)
//! 2. header: algorithm allow-list, key identifier
//! 3. key lookup + reconstruction
//! 4. signature
//! 5. claims: exp, nbf, iss, aud

use std::collections::HashSet;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::error::{AuthError, UNKNOWN_KEY};

/// Claims of a token whose signature and standard claims passed validation.
///
/// Produced once per request and handed to the protected handler by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub subject: Option<String>,
    pub issuer: String,
    pub audience: Vec<String>,
    pub expires_at: u64,
    // `None` means the claim was absent, which is not the same as empty.
    pub permissions: Option<HashSet<String>>,
}

// Only the fields we route on. `alg` stays a string so "none" and friends
// can be refused with a proper error instead of a parse failure.
#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawClaims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    // string or array of strings
    #[serde(default)]
    aud: serde_json::Value,
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    nbf: Option<u64>,
    #[serde(default)]
    permissions: Option<HashSet<String>>,
}

fn audience_list(aud: &serde_json::Value) -> Vec<String> {
    match aud {
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(arr) => arr
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: String,
    audience: String,
    algorithms: Vec<Algorithm>,
    leeway_seconds: u64,
}

impl TokenVerifier {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        algorithms: Vec<Algorithm>,
        leeway_seconds: u64,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            algorithms,
            leeway_seconds,
        }
    }

    /// Verify against the system clock.
    pub fn verify(&self, token: &str, keys: &JwkSet) -> Result<VerifiedClaims, AuthError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.verify_at(token, keys, now)
    }

    /// Verify with an explicit "now" (seconds since epoch).
    pub fn verify_at(
        &self,
        token: &str,
        keys: &JwkSet,
        now: u64,
    ) -> Result<VerifiedClaims, AuthError> {
        let segments: Vec<&str> = token.split('.').collect();
        if token.is_empty() || segments.len() != 3 {
            return Err(AuthError::MalformedHeader("token must have three segments"));
        }

        let header = decode_header(segments[0])?;

        let alg = Algorithm::from_str(&header.alg)
            .ok()
            .filter(|alg| self.algorithms.contains(alg))
            .ok_or(AuthError::InvalidHeader("algorithm not allowed"))?;

        let kid = header
            .kid
            .ok_or(AuthError::InvalidHeader("key identifier missing"))?;

        let jwk = keys.find(&kid).ok_or(AuthError::InvalidHeader(UNKNOWN_KEY))?;

        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            return Err(AuthError::InvalidHeader("key is not a signing key"));
        }

        // A key that pins its own algorithm must agree with the token.
        if let Some(key_alg) = &jwk.common.key_algorithm
            && signing_algorithm(key_alg) != Some(alg)
        {
            return Err(AuthError::InvalidHeader("key algorithm mismatch"));
        }

        let decoding_key = DecodingKey::from_jwk(jwk)
            .map_err(|_| AuthError::InvalidHeader("unable to parse signing key"))?;

        // jsonwebtoken checks the signature only; claim rules are ours so they
        // run against the caller's clock.
        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<RawClaims>(token, &decoding_key, &validation)
            .map_err(|e| map_decode_error(e.kind()))?;

        self.check_claims(data.claims, now)
    }

    fn check_claims(&self, claims: RawClaims, now: u64) -> Result<VerifiedClaims, AuthError> {
        let exp = claims
            .exp
            .ok_or(AuthError::InvalidClaims("expiry claim missing"))?;
        if exp.saturating_add(self.leeway_seconds) <= now {
            return Err(AuthError::TokenExpired);
        }

        if let Some(nbf) = claims.nbf
            && nbf > now.saturating_add(self.leeway_seconds)
        {
            return Err(AuthError::InvalidClaims("token not yet valid"));
        }

        let issuer = claims
            .iss
            .filter(|iss| *iss == self.issuer)
            .ok_or(AuthError::InvalidClaims("incorrect issuer"))?;

        let audience = audience_list(&claims.aud);
        if !audience.iter().any(|a| *a == self.audience) {
            return Err(AuthError::InvalidClaims("incorrect audience"));
        }

        Ok(VerifiedClaims {
            subject: claims.sub,
            issuer,
            audience,
            expires_at: exp,
            permissions: claims.permissions,
        })
    }
}

/// JWK `alg` -> JWS algorithm. Encryption-only algorithms have no counterpart.
fn signing_algorithm(key_alg: &KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

fn decode_header(segment: &str) -> Result<TokenHeader, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidHeader("header is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidHeader("header is not valid json"))
}

fn map_decode_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::Base64(_) => AuthError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm | ErrorKind::InvalidKeyFormat => {
            AuthError::InvalidHeader("unable to verify with the selected key")
        }
        ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::InvalidClaims("unable to parse authentication token")
        }
        ErrorKind::InvalidToken => AuthError::MalformedHeader("token must have three segments"),
        // Anything else is treated as a failed verification.
        _ => AuthError::InvalidSignature,
    }
}
