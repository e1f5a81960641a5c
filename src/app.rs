/*
 * Responsibility
 * - Config読み込み → 依存生成 (DB / DrinkStore / AuthService) → Router 組み立て
 * - Middleware の適用 (security headers / CORS / HTTP 共通)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repos::PgDrinkStore;
use crate::services::auth::build_auth_service;
use crate::state::AppState;
use crate::{api, error, middleware};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,drinks_api=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: fail fast. production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting drinks API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = apply_middleware(build_router(state), &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;

    let drinks = PgDrinkStore::new(db);
    if config.database_reset {
        tracing::warn!("DATABASE_RESET is set: dropping and reseeding the drinks table");
        drinks.reset().await?;
    } else {
        drinks.ensure_schema().await?;
    }

    let auth = build_auth_service(&config.auth)?;
    tracing::info!(
        issuer = %config.auth.issuer,
        jwks_url = %config.auth.jwks_url,
        "authorization gate configured"
    );

    Ok(AppState::new(Arc::new(drinks), auth))
}

/// Routes + JSON fallbacks. Layers are applied separately so tests can drive
/// the bare router.
pub fn build_router(state: AppState) -> Router {
    api::routes(&state)
        .fallback(error::not_found)
        .method_not_allowed_fallback(error::method_not_allowed)
        .with_state(state)
}

fn apply_middleware(router: Router, config: &Config) -> Router {
    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config.app_env, &config.cors_allowed_origins);
    middleware::http::apply(router, config.http_body_limit_bytes, config.http_timeout)
}
