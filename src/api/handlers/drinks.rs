/*
 * Responsibility
 * - /drinks 系 CRUD handler
 * - 公開: GET /drinks (short 表現)
 * - 要 permission: GET /drinks-detail, POST /drinks, PATCH/DELETE /drinks/{id}
 *   (permission の判定は gate 側。handler は AuthClaims を受け取れた時点で認可済み)
 */
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};

use crate::{
    api::{
        dto::drinks::{
            CreateDrinkRequest, DeleteResponse, DrinkLong, DrinkShort, DrinksResponse,
            UpdateDrinkRequest, UpdateRejection,
        },
        extractors::AuthClaims,
    },
    error::AppError,
    state::AppState,
};

pub async fn list_drinks(
    State(state): State<AppState>,
) -> Result<Json<DrinksResponse<DrinkShort>>, AppError> {
    let drinks = state.drinks.list().await?;

    Ok(Json(DrinksResponse::new(
        drinks.into_iter().map(DrinkShort::from).collect(),
    )))
}

pub async fn list_drink_details(
    State(state): State<AppState>,
    AuthClaims(_claims): AuthClaims,
) -> Result<Json<DrinksResponse<DrinkLong>>, AppError> {
    let drinks = state.drinks.list().await?;

    Ok(Json(DrinksResponse::new(
        drinks.into_iter().map(DrinkLong::from).collect(),
    )))
}

pub async fn create_drink(
    State(state): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    payload: Result<Json<CreateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinksResponse<DrinkLong>>, AppError> {
    let Json(req) = payload?;
    let (title, recipe) = req.validate().map_err(AppError::unprocessable)?;

    let drink = state.drinks.create(&title, &recipe).await?;
    tracing::info!(drink_id = drink.id, "drink created");

    Ok(Json(DrinksResponse::new(vec![drink.into()])))
}

pub async fn update_drink(
    State(state): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinksResponse<DrinkLong>>, AppError> {
    let Path(id) = id?;
    let Json(req) = payload?;

    let (title, recipe) = req.validate().map_err(|e| match e {
        UpdateRejection::Empty => AppError::bad_request("title or recipe is required"),
        UpdateRejection::Invalid(detail) => AppError::unprocessable(detail),
    })?;

    let drink = state
        .drinks
        .update(id, title.as_deref(), recipe.as_deref())
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(drink_id = drink.id, "drink updated");

    Ok(Json(DrinksResponse::new(vec![drink.into()])))
}

pub async fn delete_drink(
    State(state): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let Path(id) = id?;

    if !state.drinks.delete(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(drink_id = id, "drink deleted");

    Ok(Json(DeleteResponse {
        success: true,
        delete: id,
    }))
}
