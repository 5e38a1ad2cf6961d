// src/services/user_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{Role, User},
    services::auth_service,
};
use sqlx::SqlitePool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, password_hash, name, role, department, created_at";

/// Busca um utilizador pelo seu ID.
pub async fn find_user_by_id(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<User>> {
    tracing::debug!("Buscando utilizador por ID: {}", user_id);
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

pub async fn find_user_by_username(db_pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
    tracing::debug!("Buscando utilizador por username: {}", username);
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?1",
        USER_COLUMNS
    ))
    .bind(username.trim())
    .fetch_optional(db_pool)
    .await?;
    Ok(user)
}

/// Todos os utilizadores, ordenados por username.
pub async fn find_all_users(db_pool: &SqlitePool) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY username ASC",
        USER_COLUMNS
    ))
    .fetch_all(db_pool)
    .await?;
    tracing::debug!("Encontrados {} utilizadores.", users.len());
    Ok(users)
}

pub async fn count_users(db_pool: &SqlitePool) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db_pool)
        .await?;
    Ok(count)
}

pub async fn create_user(
    db_pool: &SqlitePool,
    username: &str,
    raw_password: &str,
    name: &str,
    role: Role,
    department: Option<&str>,
) -> AppResult<User> {
    create_user_with_cost(db_pool, username, raw_password, name, role, department, bcrypt::DEFAULT_COST).await
}

/// Igual a `create_user`, com o custo do bcrypt explícito (os testes usam um custo baixo).
pub async fn create_user_with_cost(
    db_pool: &SqlitePool,
    username: &str,
    raw_password: &str,
    name: &str,
    role: Role,
    department: Option<&str>,
    cost: u32,
) -> AppResult<User> {
    let username = username.trim();
    if username.is_empty() || raw_password.is_empty() {
        return Err(AppError::BadRequest("username e password são obrigatórios".into()));
    }
    tracing::info!("Tentando criar utilizador: {} ({})", username, role.as_str());

    let password_hash = auth_service::hash_password_with_cost(raw_password, cost).await?;
    let id = Uuid::new_v4().to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, name, role, department)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&id)
    .bind(username)
    .bind(&password_hash)
    .bind(name)
    .bind(role.as_str())
    .bind(department)
    .execute(db_pool)
    .await;

    // Violação de UNIQUE (username repetido)
    if let Err(sqlx::Error::Database(db_err)) = &result {
        if db_err.is_unique_violation() {
            tracing::warn!("Falha ao criar user: username '{}' já existe.", username);
            return Err(AppError::Conflict(format!("username '{}' já existe", username)));
        }
    }
    result?;

    find_user_by_id(db_pool, &id)
        .await?
        .ok_or(AppError::InternalServerError)
}

/// Cria o primeiro admin se a tabela estiver vazia. Devolve `true` se criou.
pub async fn ensure_bootstrap_admin(db_pool: &SqlitePool, username: &str, password: &str) -> AppResult<bool> {
    if count_users(db_pool).await? > 0 {
        return Ok(false);
    }
    create_user(db_pool, username, password, "Administrador", Role::Admin, Some("Administration")).await?;
    tracing::info!("Admin inicial '{}' criado.", username);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn create_and_find_users() {
        let pool = db::test_pool().await;
        let created = create_user_with_cost(&pool, " student ", "student123", "Alex Johnson", Role::Student, Some("CS"), 4)
            .await
            .unwrap();

        assert_eq!(created.username, "student");
        assert_ne!(created.password_hash, "student123");

        let by_id = find_user_by_id(&pool, &created.id).await.unwrap().unwrap();
        assert_eq!(by_id.name, "Alex Johnson");
        assert_eq!(by_id.role(), Some(Role::Student));
        assert!(find_user_by_username(&pool, "student").await.unwrap().is_some());
        assert_eq!(count_users(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let pool = db::test_pool().await;
        create_user_with_cost(&pool, "faculty", "a", "A", Role::Faculty, None, 4)
            .await
            .unwrap();
        let err = create_user_with_cost(&pool, "faculty", "b", "B", Role::Faculty, None, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(find_all_users(&pool).await.unwrap().len(), 1);
    }
}
