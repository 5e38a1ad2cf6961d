// src/web/mw_admin.rs
use crate::{error::AppError, models::user::Role, web::mw_auth::CurrentUser};
use axum::{extract::Request, middleware::Next, response::Response, Extension};

/// Só admins. Corre *depois* de `require_auth`.
pub async fn require_admin(
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user.role == Role::Admin {
        tracing::debug!("Admin MW: acesso concedido para {}", user.id);
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Admin MW: acesso negado para {} ({}).", user.id, user.role.as_str());
        Err(AppError::Forbidden)
    }
}

/// Docentes e admins (marcar presenças, gerar QR de presença, inscrever alunos).
pub async fn require_staff(
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user.role.is_staff() {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Staff MW: acesso negado para {} ({}).", user.id, user.role.as_str());
        Err(AppError::Forbidden)
    }
}
