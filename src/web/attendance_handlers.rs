// src/web/attendance_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::attendance::{AttendanceEvent, ClassAttendanceQuery, ManualAttendancePayload, MarkMethod},
    services::attendance_service,
    web::{mw_auth::CurrentUser, response::ApiResponse},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use sqlx::SqlitePool;

// POST /api/attendance (staff)
pub async fn mark_attendance(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ManualAttendancePayload>,
) -> AppResult<impl IntoResponse> {
    if payload.student.trim().is_empty() || payload.class.trim().is_empty() {
        return Err(AppError::BadRequest("student e class são obrigatórios.".to_string()));
    }

    let event = AttendanceEvent {
        student: payload.student.trim().to_string(),
        class: payload.class.trim().to_string(),
        date: payload.date.unwrap_or_else(|| Utc::now().date_naive()),
        status: payload.status,
        marked_by: user.id,
        method: MarkMethod::Manual,
    };
    let row = attendance_service::record(&pool, &event).await?;
    Ok(ApiResponse::ok_with_message(row, "Presença registada."))
}

// GET /api/attendance/student/{id}
pub async fn student_history(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<CurrentUser>,
    Path(student_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    // Alunos só veem o próprio histórico
    if user.id != student_id && !user.role.is_staff() {
        tracing::warn!("{} tentou ler o histórico de {}", user.id, student_id);
        return Err(AppError::Forbidden);
    }
    let rows = attendance_service::list_for_student(&pool, &student_id).await?;
    Ok(ApiResponse::ok(rows))
}

// GET /api/attendance/class/{id}?date=YYYY-MM-DD (staff)
pub async fn class_attendance(
    State(pool): State<SqlitePool>,
    Path(class_id): Path<String>,
    Query(query): Query<ClassAttendanceQuery>,
) -> AppResult<impl IntoResponse> {
    let rows = attendance_service::list_for_class(&pool, &class_id, query.date).await?;
    Ok(ApiResponse::ok(rows))
}
