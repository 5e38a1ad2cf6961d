// src/services/credential_service.rs
//! Ciclo de vida das credenciais QR: emissão, codificação, verificação e anti-replay.
//!
//! Formato do token (texto compacto, cabe num QR):
//!
//! ```text
//! CSQ1:<purpose>:<subjectRef url-encoded>:<issuedAt ms>:<expiresAt ms>:<nonce hex>[:<role>]
//! ```

use crate::models::{
    attendance::{AttendanceEvent, AttendanceStatus, MarkMethod},
    credential::{Credential, GrantedEvent, Purpose, RejectReason, ScanContext, SessionGrant, Verification},
    user::Role,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const TOKEN_PREFIX: &str = "CSQ1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IssueError {
    /// Menos de 1 ms, ou uma expiração fora do intervalo de datas representável.
    #[error("TTL inválido ({millis} ms): tem de ser pelo menos 1 ms e caber no calendário")]
    InvalidTtl { millis: i64 },
    #[error("credencial de login sem a role do titular")]
    MissingRole,
    #[error("credencial de presença não leva role")]
    UnexpectedRole,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("prefixo desconhecido")]
    UnknownPrefix,
    #[error("número de campos inválido: {0}")]
    FieldCount(usize),
    #[error("campo '{0}' inválido")]
    InvalidField(&'static str),
}

// --- Codificação ---

pub fn encode(credential: &Credential) -> String {
    let mut token = format!(
        "{}:{}:{}:{}:{}:{}",
        TOKEN_PREFIX,
        credential.purpose.as_str(),
        urlencoding::encode(&credential.subject_ref),
        credential.issued_at.timestamp_millis(),
        credential.expires_at.timestamp_millis(),
        credential.nonce.simple()
    );
    if let Some(role) = credential.role {
        token.push(':');
        token.push_str(role.as_str());
    }
    token
}

pub fn decode(token: &str) -> Result<Credential, CodecError> {
    let fields: Vec<&str> = token.trim().split(':').collect();
    if fields.first() != Some(&TOKEN_PREFIX) {
        return Err(CodecError::UnknownPrefix);
    }
    if !(6..=7).contains(&fields.len()) {
        return Err(CodecError::FieldCount(fields.len()));
    }

    let purpose = Purpose::parse(fields[1]).ok_or(CodecError::InvalidField("purpose"))?;
    let subject_ref = urlencoding::decode(fields[2])
        .map_err(|_| CodecError::InvalidField("subjectRef"))?
        .into_owned();
    if subject_ref.is_empty() || urlencoding::encode(&subject_ref) != fields[2] {
        return Err(CodecError::InvalidField("subjectRef"));
    }
    let issued_at = parse_millis(fields[3]).ok_or(CodecError::InvalidField("issuedAt"))?;
    let expires_at = parse_millis(fields[4]).ok_or(CodecError::InvalidField("expiresAt"))?;
    if issued_at >= expires_at {
        return Err(CodecError::InvalidField("expiresAt"));
    }
    // Só aceitamos a forma canónica (32 hex minúsculos) para o round-trip ser exato.
    let nonce = Uuid::try_parse(fields[5])
        .ok()
        .filter(|n| n.simple().to_string() == fields[5])
        .ok_or(CodecError::InvalidField("nonce"))?;

    let role = match (purpose, fields.get(6)) {
        (Purpose::Login, Some(raw)) => {
            Some(Role::parse(raw).filter(|r| r.as_str() == *raw).ok_or(CodecError::InvalidField("role"))?)
        }
        (Purpose::Login, None) => return Err(CodecError::InvalidField("role")),
        (Purpose::Attendance, None) => None,
        (Purpose::Attendance, Some(_)) => return Err(CodecError::FieldCount(fields.len())),
    };

    Ok(Credential {
        purpose,
        subject_ref,
        issued_at,
        expires_at,
        nonce,
        role,
    })
}

fn parse_millis(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.parse().ok()?;
    if millis.to_string() != raw {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

// --- Emissão ---

/// Emissor de credenciais. Não guarda estado: o nonce é um UUID v4.
#[derive(Debug, Clone, Default)]
pub struct CredentialIssuer;

impl CredentialIssuer {
    pub fn new() -> Self {
        Self
    }

    pub fn issue(
        &self,
        purpose: Purpose,
        subject_ref: &str,
        role: Option<Role>,
        ttl: Duration,
    ) -> Result<Credential, IssueError> {
        self.issue_at(purpose, subject_ref, role, ttl, Utc::now())
    }

    /// Igual a `issue` com o relógio explícito. Instantes truncados ao milissegundo.
    pub fn issue_at(
        &self,
        purpose: Purpose,
        subject_ref: &str,
        role: Option<Role>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Credential, IssueError> {
        let millis = ttl.num_milliseconds();
        if millis < 1 {
            return Err(IssueError::InvalidTtl { millis });
        }
        // role só faz sentido em login, e aí é obrigatória
        let role = match (purpose, role) {
            (Purpose::Login, Some(role)) => Some(role),
            (Purpose::Login, None) => return Err(IssueError::MissingRole),
            (Purpose::Attendance, None) => None,
            (Purpose::Attendance, Some(_)) => return Err(IssueError::UnexpectedRole),
        };
        let issued_at = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);
        let expires_at = Duration::try_milliseconds(millis)
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or(IssueError::InvalidTtl { millis })?;
        let credential = Credential {
            purpose,
            subject_ref: subject_ref.to_string(),
            issued_at,
            expires_at,
            nonce: Uuid::new_v4(),
            role,
        };
        tracing::debug!(
            "Credencial {} emitida para '{}' (nonce {}, expira {})",
            purpose.as_str(),
            credential.subject_ref,
            credential.nonce,
            credential.expires_at
        );
        Ok(credential)
    }
}

// --- Verificação ---

/// Verificador com o conjunto de nonces consumidos. Clonar partilha o mesmo conjunto.
#[derive(Debug, Clone, Default)]
pub struct CredentialVerifier {
    // nonce -> expiresAt; só precisamos de guardar os que ainda não expiraram
    consumed: Arc<Mutex<HashMap<Uuid, DateTime<Utc>>>>,
}

impl CredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodifica e verifica um token lido do QR.
    pub async fn verify(&self, token: &str, ctx: &ScanContext, now: DateTime<Utc>) -> Verification {
        match decode(token) {
            Ok(credential) => self.verify_credential(&credential, ctx, now).await,
            Err(e) => {
                tracing::warn!("Token QR rejeitado (mal formado): {}", e);
                Verification::Rejected(RejectReason::Malformed)
            }
        }
    }

    pub async fn verify_credential(
        &self,
        credential: &Credential,
        ctx: &ScanContext,
        now: DateTime<Utc>,
    ) -> Verification {
        // A expiração vem antes do replay: um token velho diz sempre "expirado".
        if credential.is_expired_at(now) {
            tracing::warn!("Credencial {} expirada em {}", credential.nonce, credential.expires_at);
            return Verification::Rejected(RejectReason::Expired);
        }

        let event = match build_event(credential, ctx, now) {
            Ok(event) => event,
            Err(reason) => {
                tracing::warn!("Credencial {} rejeitada: {:?}", credential.nonce, reason);
                return Verification::Rejected(reason);
            }
        };

        // Verificar e marcar debaixo do mesmo lock: só um pedido concorrente ganha.
        let mut consumed = self.consumed.lock().await;
        if consumed.contains_key(&credential.nonce) {
            tracing::warn!("Credencial {} reutilizada", credential.nonce);
            return Verification::Rejected(RejectReason::Replayed);
        }
        consumed.insert(credential.nonce, credential.expires_at);
        drop(consumed);

        tracing::info!(
            "Credencial {} aceite ({} para '{}')",
            credential.nonce,
            credential.purpose.as_str(),
            credential.subject_ref
        );
        Verification::Accepted(event)
    }

    /// Devolve um nonce ao estado "por usar". Para quando o evento aceite não chegou a ser gravado.
    pub async fn release(&self, nonce: Uuid) -> bool {
        let released = self.consumed.lock().await.remove(&nonce).is_some();
        if released {
            tracing::warn!("Credencial {} libertada: o evento não foi gravado", nonce);
        }
        released
    }

    /// Remove nonces cuja credencial já expirou. Devolve quantos saíram.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut consumed = self.consumed.lock().await;
        let before = consumed.len();
        consumed.retain(|_, expires_at| *expires_at >= now);
        before - consumed.len()
    }

    pub async fn tracked(&self) -> usize {
        self.consumed.lock().await.len()
    }

    /// Limpeza periódica, corre até o processo terminar.
    pub async fn run_sweeper(self, every: std::time::Duration) {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = self.prune_expired(Utc::now()).await;
            if removed > 0 {
                tracing::debug!("Limpeza de nonces: {} removidos", removed);
            }
        }
    }
}

fn build_event(
    credential: &Credential,
    ctx: &ScanContext,
    now: DateTime<Utc>,
) -> Result<GrantedEvent, RejectReason> {
    match credential.purpose {
        Purpose::Login => Ok(GrantedEvent::Session(SessionGrant {
            subject_ref: credential.subject_ref.clone(),
            role: credential.role.ok_or(RejectReason::Malformed)?,
        })),
        Purpose::Attendance => {
            let student = ctx.scanner_id.clone().ok_or(RejectReason::Unauthenticated)?;
            Ok(GrantedEvent::Attendance(AttendanceEvent {
                marked_by: student.clone(),
                student,
                class: credential.subject_ref.clone(),
                date: now.date_naive(),
                status: AttendanceStatus::Present,
                method: MarkMethod::Qr,
            }))
        }
    }
}
