// src/web/user_handlers.rs
use crate::{
    error::AppResult,
    models::user::{CreateUserPayload, UserSummary},
    services::user_service,
    web::response::ApiResponse,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;

// GET /api/users (admin)
pub async fn list_users(State(pool): State<SqlitePool>) -> AppResult<impl IntoResponse> {
    let users: Vec<UserSummary> = user_service::find_all_users(&pool)
        .await?
        .into_iter()
        .map(UserSummary::from)
        .collect();
    Ok(ApiResponse::ok(users))
}

// POST /api/users (admin)
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateUserPayload>,
) -> AppResult<impl IntoResponse> {
    let user = user_service::create_user(
        &pool,
        &payload.username,
        &payload.password,
        &payload.name,
        payload.role,
        payload.department.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(UserSummary::from(user))))
}
