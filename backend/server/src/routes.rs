use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    analysis::{AnalysisResponse, AnalyzePayload, analyze},
    auth::{SignInPayload, SignInResponse, SignUpPayload, SignUpResponse, sign_in, sign_up},
    error::AppError,
    models::Stats,
    profile::{ProfilePayload, ProfileResponse, get_profile, update_profile},
    records::{CreateTestPayload, CreatedTest, ListQuery, TestList, create_test, get_stats, list_tests},
    state::AppState,
    upload::{UploadResponse, read_form, upload_image},
    utils::bearer,
};

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn sign_up_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignUpPayload>, JsonRejection>,
) -> Result<Json<SignUpResponse>, AppError> {
    let Json(payload) = payload?;

    Ok(Json(sign_up(&state, payload).await?))
}

pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignInPayload>, JsonRejection>,
) -> Result<Json<SignInResponse>, AppError> {
    let Json(payload) = payload?;

    Ok(Json(sign_in(&state, payload).await?))
}

pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(get_profile(&state, bearer(&headers)).await?))
}

pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ProfilePayload>, JsonRejection>,
) -> Result<Json<ProfileResponse>, AppError> {
    let Json(payload) = payload?;

    Ok(Json(update_profile(&state, bearer(&headers), payload).await?))
}

pub async fn list_tests_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<TestList>, AppError> {
    let Query(query) = query?;

    Ok(Json(list_tests(&state, bearer(&headers), query).await?))
}

pub async fn create_test_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateTestPayload>, JsonRejection>,
) -> Result<Json<CreatedTest>, AppError> {
    let Json(payload) = payload?;

    Ok(Json(create_test(&state, bearer(&headers), payload).await?))
}

pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Stats>, AppError> {
    Ok(Json(get_stats(&state, bearer(&headers)).await?))
}

pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let form = read_form(multipart?).await?;

    Ok(Json(upload_image(&state, bearer(&headers), form).await?))
}

pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<AnalyzePayload>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let Json(payload) = payload?;

    Ok(Json(analyze(&state, bearer(&headers), payload).await?))
}

pub async fn categories_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "categories": state.bank.categories }))
}

pub async fn category_handler(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let category = state
        .bank
        .category(&category_id)
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    Ok(Json(json!({ "category": category })))
}

pub async fn guide_handler(
    State(state): State<Arc<AppState>>,
    Path((category_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let guide = state
        .bank
        .guide(&category_id, &item_id)
        .ok_or_else(|| AppError::NotFound("Testing guide not found".to_string()))?;

    Ok(Json(json!({ "guide": guide })))
}
