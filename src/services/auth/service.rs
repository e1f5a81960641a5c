use std::sync::Arc;

use tracing::{debug, warn};

use super::error::AuthError;
use super::jwks::KeyProvider;
use super::permissions;
use super::verifier::{TokenVerifier, VerifiedClaims};

/// Key set + verifier + permission check, in that order.
///
/// The gate middleware owns the HTTP side (header extraction); this owns the
/// decision. Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct AuthService {
    keys: Arc<dyn KeyProvider>,
    verifier: TokenVerifier,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("verifier", &self.verifier)
            .finish()
    }
}

impl AuthService {
    pub fn new(keys: Arc<dyn KeyProvider>, verifier: TokenVerifier) -> Self {
        Self { keys, verifier }
    }

    /// Verify `token` and require `permission`.
    ///
    /// An unknown key identifier asks the provider to drop its cached key set
    /// (it may refuse if the set is fresh) and retries once, which covers key
    /// rotation at the identity provider.
    pub async fn authorize(
        &self,
        token: &str,
        permission: &str,
    ) -> Result<VerifiedClaims, AuthError> {
        let claims = match self.verify(token).await {
            Err(err) if err.is_unknown_key() => {
                debug!("token references an unknown key; refreshing signing keys");
                self.keys.invalidate().await;
                self.verify(token).await?
            }
            other => other?,
        };

        permissions::check(&claims, permission)?;
        Ok(claims)
    }

    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let keys = self.keys.fetch_keys().await.map_err(|err| {
            warn!(error = %err, "signing key set unavailable");
            AuthError::KeyProviderUnavailable
        })?;

        self.verifier.verify(token, &keys)
    }
}
