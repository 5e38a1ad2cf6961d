// src/models/attendance.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkMethod {
    Manual,
    Qr,
}

impl MarkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkMethod::Manual => "manual",
            MarkMethod::Qr => "qr",
        }
    }
}

/// Uma marcação de presença. Chave lógica: (student, class, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    pub student: String,
    pub class: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: String,
    pub method: MarkMethod,
}

/// Linha da tabela `attendance` (tudo TEXT no SQLite).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub student_id: String,
    pub class_id: String,
    pub date: String,
    pub status: String,
    pub marked_by: String,
    pub method: String,
    pub updated_at: Option<String>,
}

/// Marcação manual feita por docente/admin.
#[derive(Debug, Deserialize)]
pub struct ManualAttendancePayload {
    pub student: String,
    pub class: String,
    /// Omitido = hoje.
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Deserialize)]
pub struct ClassAttendanceQuery {
    pub date: Option<NaiveDate>,
}
