// src/web/qr_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        credential::{
            Credential, GenerateAttendanceQrPayload, GrantedEvent, IssuedQr, Purpose, RejectReason, ScanContext,
            SessionGrant, Verification, VerifyQrPayload,
        },
        user::UserSummary,
    },
    services::{attendance_service, credential_service, user_service},
    state::AppState,
    web::{
        mw_auth::{self, CurrentUser},
        response::{self, ApiResponse},
    },
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::{Duration, Utc};
use tower_sessions::Session;

fn issued(credential: Credential) -> IssuedQr {
    IssuedQr {
        token: credential_service::encode(&credential),
        purpose: credential.purpose,
        subject_ref: credential.subject_ref,
        expires_at: credential.expires_at,
    }
}

// POST /api/qr/generate-attendance (staff)
pub async fn generate_attendance_qr(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<GenerateAttendanceQrPayload>,
) -> AppResult<impl IntoResponse> {
    let class_id = payload.class_id.trim();
    if class_id.is_empty() {
        return Err(AppError::BadRequest("classId em falta.".to_string()));
    }

    let ttl = match payload.expiry_minutes {
        None => state.config.attendance_qr_ttl,
        Some(minutes) => {
            let max_minutes = state.config.attendance_qr_max_ttl.num_minutes();
            if minutes > max_minutes {
                return Err(AppError::BadRequest(format!(
                    "expiryMinutes acima do máximo ({} min).",
                    max_minutes
                )));
            }
            Duration::try_minutes(minutes).ok_or_else(|| AppError::BadRequest("expiryMinutes inválido.".to_string()))?
        }
    };

    // TTL <= 0 chega aqui e sai como IssueError::InvalidTtl
    let credential = state.issuer.issue(Purpose::Attendance, class_id, None, ttl)?;
    tracing::info!("QR de presença para a aula {} emitido por {}", class_id, user.id);
    Ok((StatusCode::CREATED, ApiResponse::ok(issued(credential))))
}

// POST /api/qr/generate-login
pub async fn generate_login_qr(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let credential = state
        .issuer
        .issue(Purpose::Login, &user.id, Some(user.role), state.config.login_qr_ttl)?;
    tracing::info!("QR de login emitido para {}", user.id);
    Ok((StatusCode::CREATED, ApiResponse::ok(issued(credential))))
}

/// Decodifica o token e confirma o propósito antes de consumir o nonce.
fn decode_for(token: &str, expected: Purpose) -> Result<Credential, Response> {
    let credential = credential_service::decode(token.trim()).map_err(|e| {
        tracing::warn!("Token QR rejeitado (mal formado): {}", e);
        response::rejected(RejectReason::Malformed)
    })?;
    if credential.purpose != expected {
        tracing::warn!(
            "QR de {} apresentado onde se esperava {}",
            credential.purpose.as_str(),
            expected.as_str()
        );
        return Err(response::rejected(RejectReason::Malformed));
    }
    Ok(credential)
}

// POST /api/qr/verify-attendance
pub async fn verify_attendance_qr(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<VerifyQrPayload>,
) -> AppResult<Response> {
    let credential = match decode_for(&payload.token, Purpose::Attendance) {
        Ok(credential) => credential,
        Err(rejection) => return Ok(rejection),
    };
    let ctx = ScanContext::for_user(user.id.as_str());
    match state.verifier.verify_credential(&credential, &ctx, Utc::now()).await {
        Verification::Accepted(GrantedEvent::Attendance(event)) => {
            match attendance_service::record(&state.db_pool, &event).await {
                Ok(row) => Ok(ApiResponse::ok_with_message(row, "Presença registada por QR.").into_response()),
                Err(e) => {
                    // Nada ficou gravado: o mesmo QR pode voltar a ser lido
                    state.verifier.release(credential.nonce).await;
                    Err(e)
                }
            }
        }
        Verification::Accepted(GrantedEvent::Session(_)) => Ok(response::rejected(RejectReason::Malformed)),
        Verification::Rejected(reason) => Ok(response::rejected(reason)),
    }
}

// POST /api/qr/verify-login (público)
pub async fn verify_login_qr(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<VerifyQrPayload>,
) -> AppResult<Response> {
    let credential = match decode_for(&payload.token, Purpose::Login) {
        Ok(credential) => credential,
        Err(rejection) => return Ok(rejection),
    };
    let grant: SessionGrant = match state
        .verifier
        .verify_credential(&credential, &ScanContext::anonymous(), Utc::now())
        .await
    {
        Verification::Accepted(GrantedEvent::Session(grant)) => grant,
        Verification::Accepted(GrantedEvent::Attendance(_)) => return Ok(response::rejected(RejectReason::Malformed)),
        Verification::Rejected(reason) => return Ok(response::rejected(reason)),
    };

    // O utilizador pode ter sido apagado depois de o QR ser emitido
    let user = user_service::find_user_by_id(&state.db_pool, &grant.subject_ref)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let role = user.role().ok_or(AppError::InternalServerError)?;

    mw_auth::start_session(&session, &CurrentUser { id: user.id.clone(), role }).await?;
    tracing::info!("✅ Login por QR para: {}", user.username);
    Ok(ApiResponse::ok(UserSummary::from(user)).into_response())
}
