// src/web/mw_auth.rs
use crate::{error::AppError, models::user::Role};
use axum::{extract::Request, middleware::Next, response::Response};
use tower_sessions::Session;

pub const SESSION_USER_ID: &str = "user_id";
pub const SESSION_ROLE: &str = "role";

/// Utilizador autenticado, posto nas extensões do pedido por `require_auth`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

/// Lê o utilizador da sessão (None se não houver login).
pub async fn current_user(session: &Session) -> Result<Option<CurrentUser>, AppError> {
    let user_id = session
        .get::<String>(SESSION_USER_ID)
        .await
        .map_err(|e| AppError::SessionError(format!("Erro ao ler sessão: {}", e)))?;
    let role = session
        .get::<Role>(SESSION_ROLE)
        .await
        .map_err(|e| AppError::SessionError(format!("Erro ao ler sessão: {}", e)))?;

    Ok(match (user_id, role) {
        (Some(id), Some(role)) => Some(CurrentUser { id, role }),
        _ => None,
    })
}

/// Abre (ou renova) a sessão para um utilizador. Usado pelo login normal e pelo login por QR.
pub async fn start_session(session: &Session, user: &CurrentUser) -> Result<(), AppError> {
    // Novo ID de sessão a cada login
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao rodar ID: {}", e)))?;
    session
        .insert(SESSION_USER_ID, &user.id)
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao inserir na sessão: {}", e)))?;
    session
        .insert(SESSION_ROLE, user.role)
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao inserir na sessão: {}", e)))?;
    Ok(())
}

// Middleware que verifica se o utilizador está logado
pub async fn require_auth(session: Session, mut request: Request, next: Next) -> Result<Response, AppError> {
    match current_user(&session).await? {
        Some(user) => {
            tracing::debug!("Autenticação MW: '{}' ({}) autenticado.", user.id, user.role.as_str());
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        None => {
            tracing::debug!("Autenticação MW: pedido sem sessão para {}", request.uri().path());
            Err(AppError::Unauthorized)
        }
    }
}
