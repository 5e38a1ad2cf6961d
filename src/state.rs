// src/state.rs
use crate::{
    config::AppConfig,
    services::credential_service::{CredentialIssuer, CredentialVerifier},
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub issuer: CredentialIssuer,
    // Partilhado entre pedidos: o conjunto de nonces consumidos vive aqui dentro
    pub verifier: CredentialVerifier,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: AppConfig) -> Self {
        Self {
            db_pool,
            config: Arc::new(config),
            issuer: CredentialIssuer::new(),
            verifier: CredentialVerifier::new(),
        }
    }
}

// Permite extrair o pool da DB diretamente
impl axum::extract::FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.db_pool.clone()
    }
}
