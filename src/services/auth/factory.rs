/// Factory: build `AuthService` from application `Config`.
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::auth::{AuthService, KeyProviderError, RemoteKeyProvider, TokenVerifier};

pub fn build_auth_service(config: &AuthConfig) -> Result<Arc<AuthService>, KeyProviderError> {
    let keys = RemoteKeyProvider::new(
        config.jwks_url.clone(),
        config.jwks_cache_ttl,
        config.jwks_fetch_timeout,
    )?
    .with_min_refresh_interval(config.jwks_min_refresh_interval);

    let verifier = TokenVerifier::new(
        &config.issuer,
        &config.audience,
        config.algorithms.clone(),
        config.leeway_seconds,
    );

    Ok(Arc::new(AuthService::new(Arc::new(keys), verifier)))
}
