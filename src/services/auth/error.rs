//! Authorization failure taxonomy.
//!
//! Every variant is terminal for the current request. Descriptions are static
//! strings so nothing from the presented token can end up in a response or log.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Authorization header absent, wrong scheme, or token not three segments.
    #[error("malformed_header: {0}")]
    MalformedHeader(&'static str),
    /// Token header declares a disallowed algorithm or an unknown key.
    #[error("invalid_header: {0}")]
    InvalidHeader(&'static str),
    #[error("invalid_signature: token signature could not be verified")]
    InvalidSignature,
    #[error("token_expired: token has expired")]
    TokenExpired,
    /// Issuer/audience mismatch, undecodable claims, or no permissions claim.
    #[error("invalid_claims: {0}")]
    InvalidClaims(&'static str),
    /// Authenticated, but the required permission is not granted.
    #[error("unauthorized: permission not found")]
    Unauthorized,
    /// The signing key set could not be obtained; the token was never evaluated.
    #[error("key_provider_unavailable: signing keys could not be retrieved")]
    KeyProviderUnavailable,
}

/// Description used when the token's key identifier is absent from the key set.
pub const UNKNOWN_KEY: &str = "unable to find the appropriate key";

impl AuthError {
    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedHeader(_) => "malformed_header",
            Self::InvalidHeader(_) => "invalid_header",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
            Self::InvalidClaims(_) => "invalid_claims",
            Self::Unauthorized => "unauthorized",
            Self::KeyProviderUnavailable => "key_provider_unavailable",
        }
    }

    pub fn is_unknown_key(&self) -> bool {
        matches!(self, Self::InvalidHeader(UNKNOWN_KEY))
    }
}
