// src/web/response.rs
use crate::models::credential::RejectReason;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Envelope comum das respostas JSON: `{ success, data?, message? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        })
    }
}

pub fn message(text: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        data: None,
        message: Some(text.into()),
    })
}

#[derive(Debug, Serialize)]
struct Rejection {
    reason: RejectReason,
}

/// Resposta para um QR recusado. Não é erro do servidor: é um estado para o utilizador.
pub fn rejected(reason: RejectReason) -> Response {
    let status = match reason {
        RejectReason::Malformed => StatusCode::BAD_REQUEST,
        RejectReason::Unauthenticated => StatusCode::UNAUTHORIZED,
        RejectReason::Replayed => StatusCode::CONFLICT,
        RejectReason::Expired => StatusCode::GONE,
    };
    let body = ApiResponse {
        success: false,
        data: Some(Rejection { reason }),
        message: Some(reason.message().to_string()),
    };
    (status, Json(body)).into_response()
}
