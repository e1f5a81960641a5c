/*
 * Responsibility
 * - URL 構造と、ルートごとの必要 permission を定義
 * - permission はここで固定 (リクエスト内容から動的に決めない)
 */
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::api::handlers::{
    drinks::{create_drink, delete_drink, list_drink_details, list_drinks, update_drink},
    health::health,
};
use crate::middleware::auth::require;
use crate::state::AppState;

pub const GET_DRINKS_DETAIL: &str = "get:drinks-detail";
pub const POST_DRINKS: &str = "post:drinks";
pub const PATCH_DRINKS: &str = "patch:drinks";
pub const DELETE_DRINKS: &str = "delete:drinks";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/drinks",
            get(list_drinks).merge(require(post(create_drink), state, POST_DRINKS)),
        )
        .route(
            "/drinks-detail",
            require(get(list_drink_details), state, GET_DRINKS_DETAIL),
        )
        .route(
            "/drinks/{id}",
            require(patch(update_drink), state, PATCH_DRINKS).merge(require(
                delete(delete_drink),
                state,
                DELETE_DRINKS,
            )),
        )
}
