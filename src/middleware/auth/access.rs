//! Authorization gate: bearer token → verify → permission check → VerifiedClaims を extensions に入れる
//!
//! - ルート登録時に必要な permission を固定で宣言する (`require`)
//! - 失敗時は AuthError をそのまま AppError に載せて返す (handler は実行されない)
//! - token / claims の中身はログに出さない (kind のみ)

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Gate state: which permission this route demands.
#[derive(Clone)]
struct RequiredPermission {
    auth: Arc<AuthService>,
    permission: &'static str,
}

/// Wrap a route so it only runs for tokens granting `permission`.
///
/// 例：
/// ```ignore
/// .route("/drinks/{id}", access::require(delete(delete_drink), &state, "delete:drinks"))
/// ```
pub fn require(
    route: MethodRouter<AppState>,
    state: &AppState,
    permission: &'static str,
) -> MethodRouter<AppState> {
    let gate = RequiredPermission {
        auth: state.auth.clone(),
        permission,
    };
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    route.route_layer(middleware::from_fn_with_state(gate, access_middleware))
}

async fn access_middleware(
    State(gate): State<RequiredPermission>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Owned copy so no borrow of the request is held across the await.
    let token = bearer_token(req.headers()).map(str::to_owned);

    let result = match token {
        Ok(token) => gate.auth.authorize(&token, gate.permission).await,
        Err(err) => Err(err),
    };

    let claims = match result {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(
                kind = err.code(),
                permission = gate.permission,
                method = %req.method(),
                path = req.uri().path(),
                "request denied"
            );
            return Err(err.into());
        }
    };

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// `Authorization: Bearer <token>` から token を取り出す。
///
/// 明らかに壊れたヘッダは検証に進ませない。
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MalformedHeader("authorization header is expected"))?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("authorization header is not valid text"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts
        .next()
        .ok_or(AuthError::MalformedHeader("authorization header is expected"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader(
            "authorization header must start with \"Bearer\"",
        ));
    }

    let token = parts
        .next()
        .ok_or(AuthError::MalformedHeader("token not found"))?;
    if parts.next().is_some() {
        return Err(AuthError::MalformedHeader(
            "authorization header must be bearer token",
        ));
    }

    Ok(token)
}
