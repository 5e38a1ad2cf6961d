// src/web/timetable_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::timetable::{EnrollPayload, TimetableSpec},
    services::timetable_service,
    state::AppState,
    web::{mw_auth::CurrentUser, response::{self, ApiResponse}},
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use sqlx::SqlitePool;

// POST /api/timetables/generate (admin)
pub async fn generate_timetable(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(spec): Json<TimetableSpec>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("Pedido de horário '{}' por {}", spec.name, user.id);
    let stored = timetable_service::generate_and_save(&state.db_pool, &state.config.grid, spec, &user.id).await?;
    let message = format!("Horário gerado com {} aulas.", stored.timetable.classes.len());
    Ok((StatusCode::CREATED, ApiResponse::ok_with_message(stored, message)))
}

// GET /api/timetables
pub async fn list_timetables(State(pool): State<SqlitePool>) -> AppResult<impl IntoResponse> {
    let rows = timetable_service::list(&pool).await?;
    Ok(ApiResponse::ok(rows))
}

// GET /api/timetables/{id}
pub async fn get_timetable(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let stored = timetable_service::find(&pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Horário {}", id)))?;
    Ok(ApiResponse::ok(stored))
}

// DELETE /api/timetables/{id} (admin)
pub async fn delete_timetable(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    if !timetable_service::delete(&pool, &id).await? {
        return Err(AppError::NotFound(format!("Horário {}", id)));
    }
    Ok(response::message("Horário apagado."))
}

// POST /api/timetables/{id}/classes/{course_code}/enroll (staff)
pub async fn enroll_student(
    State(pool): State<SqlitePool>,
    Path((id, course_code)): Path<(String, String)>,
    Json(payload): Json<EnrollPayload>,
) -> AppResult<impl IntoResponse> {
    let student_id = payload.student_id.trim();
    if student_id.is_empty() {
        return Err(AppError::BadRequest("studentId em falta.".to_string()));
    }
    let added = timetable_service::enroll(&pool, &id, &course_code, student_id).await?;
    let message = if added {
        "Aluno inscrito."
    } else {
        "Aluno já estava inscrito."
    };
    Ok(response::message(message))
}
