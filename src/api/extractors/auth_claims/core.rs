use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::{AuthError, VerifiedClaims};

/// Handler で VerifiedClaims を受け取るための extractor
/// middleware (gate) が request.extensions() に insert 済みである前提
/// 見つからない場合は 401 (ゲート未設定のルートでは handler を実行させない)
pub struct AuthClaims(pub VerifiedClaims);

impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedClaims>()
            .cloned()
            .map(AuthClaims)
            .ok_or(AppError::Auth(AuthError::Unauthorized))
    }
}
