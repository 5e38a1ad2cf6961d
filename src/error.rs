// src/error.rs
use crate::{
    models::timetable::EnrollmentError,
    services::{credential_service::IssueError, timetable_engine::ScheduleError},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Erro na base de dados: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Erro de migração da base de dados: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Erro ao processar password")]
    PasswordHashingError,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Erro na sessão: {0}")]
    SessionError(String),

    #[error("Erro interno inesperado")]
    InternalServerError,

    #[error("Não autenticado")]
    Unauthorized,

    #[error("Sem permissão")]
    Forbidden,

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Pedido inválido: {0}")]
    BadRequest(String),

    #[error("Já existe: {0}")]
    Conflict(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Issue(#[from] IssueError),

    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
}

// Como converter AppError numa resposta HTTP (JSON no envelope { success, message })
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Loga o erro detalhado no servidor
        tracing::error!("Erro processado: {:?}", self);

        let (status, message, extra) = match &self {
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erro ao aceder aos dados.".to_string(),
                None,
            ),
            AppError::PasswordHashingError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erro ao processar credenciais.".to_string(),
                None,
            ),
            // Mensagem genérica: não revela se o utilizador existe
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Utilizador ou senha inválidos.".to_string(),
                None,
            ),
            AppError::SessionError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erro na gestão da sua sessão.".to_string(),
                None,
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Sessão necessária.".to_string(), None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Sem permissão.".to_string(), None),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} não encontrado.", what), None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::Schedule(ScheduleError::InvalidSpec(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }
            AppError::Schedule(e @ ScheduleError::Infeasible { unplaced, requested }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                e.to_string(),
                Some(json!({ "unplaced": unplaced, "requested": requested })),
            ),
            AppError::Issue(e) => (StatusCode::BAD_REQUEST, e.to_string(), None),
            AppError::Enrollment(e @ EnrollmentError::UnknownClass(_)) => {
                (StatusCode::NOT_FOUND, e.to_string(), None)
            }
            AppError::Enrollment(e @ EnrollmentError::CapacityReached { .. }) => {
                (StatusCode::CONFLICT, e.to_string(), None)
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Ocorreu um erro inesperado.".to_string(),
                None,
            ),
        };

        let mut body = json!({ "success": false, "message": message });
        if let (Some(extra), Some(obj)) = (extra, body.as_object_mut()) {
            obj.insert("data".into(), extra);
        }
        (status, Json(body)).into_response()
    }
}

// Tipo Result padrão para a aplicação
pub type AppResult<T = ()> = Result<T, AppError>;
