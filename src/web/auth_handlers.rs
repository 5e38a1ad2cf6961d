// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{LoginForm, UserSummary},
    services::{auth_service, user_service},
    state::AppState,
    web::{
        mw_auth::{self, CurrentUser},
        response::{self, ApiResponse},
    },
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    Extension,
};
use tower_sessions::Session;

// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("Tentativa de login para: {}", form.username);

    let user = auth_service::authenticate(&state.db_pool, &form.username, &form.password).await?;
    let role = user.role().ok_or_else(|| {
        tracing::error!("Utilizador {} com role desconhecida: {}", user.id, user.role);
        AppError::InternalServerError
    })?;

    mw_auth::start_session(&session, &CurrentUser { id: user.id.clone(), role }).await?;
    tracing::info!("✅ Login bem-sucedido para: {}", user.username);

    Ok(ApiResponse::ok(UserSummary::from(user)))
}

// POST /api/auth/logout
pub async fn handle_logout(session: Session) -> AppResult<impl IntoResponse> {
    let user_id: Option<String> = session.get(mw_auth::SESSION_USER_ID).await.ok().flatten();

    // Apaga todos os dados da sessão atual
    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao apagar sessão: {}", e)))?;

    match user_id {
        Some(id) => tracing::info!("🚪 Utilizador '{}' desligado.", id),
        None => tracing::info!("🚪 Sessão anónima desligada."),
    }
    Ok(response::message("Sessão terminada."))
}

// GET /api/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let user = user_service::find_user_by_id(&state.db_pool, &current.id)
        .await?
        .ok_or_else(|| {
            // Sessão válida mas o utilizador já não existe
            tracing::warn!("user_id '{}' em sessão não existe na DB", current.id);
            AppError::Unauthorized
        })?;
    Ok(ApiResponse::ok(UserSummary::from(user)))
}
