// src/models/credential.rs
use crate::models::{attendance::AttendanceEvent, user::Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Para que serve o código QR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Login,
    Attendance,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Login => "login",
            Purpose::Attendance => "attendance",
        }
    }

    pub fn parse(raw: &str) -> Option<Purpose> {
        match raw {
            "login" => Some(Purpose::Login),
            "attendance" => Some(Purpose::Attendance),
            _ => None,
        }
    }
}

/// Credencial de uso único. Tudo o que o verificador precisa vai aqui dentro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub purpose: Purpose,
    /// ID do utilizador (login) ou da aula (presença).
    pub subject_ref: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub nonce: Uuid,
    /// Só credenciais de login transportam a role do titular.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Quem está a ler o QR (contexto explícito, nada de estado global).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub scanner_id: Option<String>,
}

impl ScanContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            scanner_id: Some(user_id.into()),
        }
    }
}

/// Instrução para o colaborador de sessão abrir uma sessão.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub subject_ref: String,
    pub role: Role,
}

/// Evento autorizado por uma credencial aceite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GrantedEvent {
    Session(SessionGrant),
    Attendance(AttendanceEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    Expired,
    Replayed,
    Malformed,
    /// QR de presença lido sem utilizador autenticado.
    Unauthenticated,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::Expired => "Código QR expirado.",
            RejectReason::Replayed => "Código QR já utilizado.",
            RejectReason::Malformed => "Código QR inválido.",
            RejectReason::Unauthenticated => "É necessário iniciar sessão para registar presença.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Accepted(GrantedEvent),
    Rejected(RejectReason),
}

impl Verification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verification::Accepted(_))
    }
}

// --- Payloads HTTP ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAttendanceQrPayload {
    pub class_id: String,
    pub expiry_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQrPayload {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedQr {
    pub token: String,
    pub purpose: Purpose,
    pub subject_ref: String,
    pub expires_at: DateTime<Utc>,
}
