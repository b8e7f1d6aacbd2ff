//! User repository
//!
//! Database operations for users and their role assignments.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite

use crate::db::DynDatabasePool;
use crate::models::{CreateUserInput, UpdateUserInput, User, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user and assign its roles; unknown role ids are skipped
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_by_reset_token(&self, token: &str) -> Result<Option<User>>;

    /// All users, oldest first
    async fn list(&self) -> Result<Vec<User>>;

    async fn count(&self) -> Result<i64>;

    /// Apply a partial update, returning `None` when the user doesn't exist
    async fn update(&self, id: i64, input: &UpdateUserInput) -> Result<Option<User>>;

    /// Delete a user, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn set_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    async fn set_mfa_secret(&self, id: i64, secret: Option<&str>) -> Result<()>;

    async fn set_reset_token(
        &self,
        id: i64,
        token: Option<&str>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Store a new password hash and clear any pending reset token
    async fn update_password(&self, id: i64, hashed_password: &str) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        create_user(self.pool.sqlite(), input).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        get_user_by(self.pool.sqlite(), "id = ?", UserKey::Id(id)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        get_user_by(self.pool.sqlite(), "email = ?", UserKey::Text(email)).await
    }

    async fn get_by_reset_token(&self, token: &str) -> Result<Option<User>> {
        get_user_by(self.pool.sqlite(), "reset_token = ?", UserKey::Text(token)).await
    }

    async fn list(&self) -> Result<Vec<User>> {
        list_users(self.pool.sqlite()).await
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count users")?;
        Ok(count)
    }

    async fn update(&self, id: i64, input: &UpdateUserInput) -> Result<Option<User>> {
        update_user(self.pool.sqlite(), id, input).await?;
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to record login")?;
        Ok(())
    }

    async fn set_mfa_secret(&self, id: i64, secret: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET mfa_secret = ?, updated_at = ? WHERE id = ?")
            .bind(secret)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update MFA secret")?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: Option<&str>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET reset_token = ?, reset_token_expires = ? WHERE id = ?")
            .bind(token)
            .bind(expires)
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to store reset token")?;
        Ok(())
    }

    async fn update_password(&self, id: i64, hashed_password: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET hashed_password = ?, reset_token = NULL, reset_token_expires = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(hashed_password)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update password")?;
        Ok(())
    }
}

enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

const USER_COLUMNS: &str = r#"
    id, email, full_name, hashed_password, status, is_active, is_superuser, mfa_secret,
    reset_token, reset_token_expires, last_login_at, created_at, updated_at
"#;

async fn create_user(pool: &SqlitePool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, full_name, hashed_password, status, is_active, is_superuser,
                           mfa_secret, created_at, updated_at)
        VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.email)
    .bind(&input.full_name)
    .bind(&input.hashed_password)
    .bind(input.status.to_string())
    .bind(input.is_superuser)
    .bind(&input.mfa_secret)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create user")?;

    let id = result.last_insert_rowid();

    for role_id in &input.role_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE id = ?",
        )
        .bind(id)
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .context("Failed to assign role")?;
    }

    tx.commit().await.context("Failed to commit user")?;

    get_user_by(pool, "id = ?", UserKey::Id(id))
        .await?
        .context("Created user disappeared")
}

async fn get_user_by(pool: &SqlitePool, condition: &str, key: UserKey<'_>) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    match row {
        Some(row) => {
            let mut user = row_to_user(&row)?;
            user.roles = role_names_for_user(pool, user.id).await?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

async fn role_names_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT r.name FROM roles r
        INNER JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = ?
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to load user roles")?;
    Ok(names)
}

async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    let role_rows = sqlx::query(
        r#"
        SELECT ur.user_id, r.name FROM user_roles ur
        INNER JOIN roles r ON r.id = ur.role_id
        ORDER BY r.name
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to load user roles")?;

    let mut roles_by_user: HashMap<i64, Vec<String>> = HashMap::new();
    for row in role_rows {
        roles_by_user
            .entry(row.get("user_id"))
            .or_default()
            .push(row.get("name"));
    }

    rows.iter()
        .map(|row| {
            let mut user = row_to_user(row)?;
            user.roles = roles_by_user.remove(&user.id).unwrap_or_default();
            Ok(user)
        })
        .collect()
}

async fn update_user(pool: &SqlitePool, id: i64, input: &UpdateUserInput) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    sqlx::query(
        r#"
        UPDATE users
        SET full_name = COALESCE(?, full_name),
            status = COALESCE(?, status),
            is_active = COALESCE(?, is_active),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.full_name)
    .bind(input.status.map(|s| s.to_string()))
    .bind(input.is_active)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update user")?;

    if let Some(role_ids) = &input.role_ids {
        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear user roles")?;

        for role_id in role_ids {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO user_roles (user_id, role_id)
                SELECT u.id, r.id FROM users u, roles r WHERE u.id = ? AND r.id = ?
                "#,
            )
            .bind(id)
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .context("Failed to assign role")?;
        }
    }

    tx.commit().await.context("Failed to commit user update")?;
    Ok(())
}

/// Convert a row to User; roles are filled in by the caller
fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let status_str: String = row.get("status");
    let status = UserStatus::from_str(&status_str)
        .with_context(|| format!("Invalid status in database: {}", status_str))?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        hashed_password: row.get("hashed_password"),
        status,
        is_active: row.get("is_active"),
        is_superuser: row.get("is_superuser"),
        mfa_secret: row.get("mfa_secret"),
        reset_token: row.get("reset_token"),
        reset_token_expires: row.get("reset_token_expires"),
        last_login_at: row.get("last_login_at"),
        roles: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    async fn role_id(pool: &DynDatabasePool, name: &str) -> i64 {
        sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
            .bind(name)
            .fetch_one(pool.sqlite())
            .await
            .expect("Role not seeded")
    }

    fn input(email: &str, role_ids: Vec<i64>) -> CreateUserInput {
        CreateUserInput {
            email: email.to_string(),
            full_name: Some("Test User".to_string()),
            hashed_password: "hash".to_string(),
            role_ids,
            ..CreateUserInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_user_with_roles() {
        let (pool, repo) = setup_test_repo().await;
        let author = role_id(&pool, "author").await;
        let editor = role_id(&pool, "editor").await;

        let created = repo
            .create(&input("test@example.com", vec![author, editor, 9999]))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        assert_eq!(created.email, "test@example.com");
        assert_eq!(created.status, UserStatus::Active);
        assert!(created.is_active);
        assert!(!created.is_superuser);
        assert_eq!(created.roles, vec!["author".to_string(), "editor".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&input("dup@example.com", vec![])).await.unwrap();

        let err = repo.create(&input("dup@example.com", vec![])).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_get_by_email_and_missing() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo.create(&input("a@example.com", vec![])).await.unwrap();

        let found = repo.get_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_roles() {
        let (pool, repo) = setup_test_repo().await;
        let author = role_id(&pool, "author").await;
        let reviewer = role_id(&pool, "reviewer").await;
        let created = repo.create(&input("a@example.com", vec![author])).await.unwrap();

        let updated = repo
            .update(
                created.id,
                &UpdateUserInput {
                    full_name: Some("Renamed".to_string()),
                    status: Some(UserStatus::Suspended),
                    is_active: Some(false),
                    role_ids: Some(vec![reviewer]),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.full_name.as_deref(), Some("Renamed"));
        assert_eq!(updated.status, UserStatus::Suspended);
        assert!(!updated.is_active);
        assert_eq!(updated.roles, vec!["reviewer".to_string()]);
    }

    #[tokio::test]
    async fn test_update_missing_user_returns_none() {
        let (_pool, repo) = setup_test_repo().await;
        let result = repo.update(42, &UpdateUserInput::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (pool, repo) = setup_test_repo().await;
        let author = role_id(&pool, "author").await;
        let a = repo.create(&input("a@example.com", vec![author])).await.unwrap();
        repo.create(&input("b@example.com", vec![])).await.unwrap();

        let users = repo.list().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].roles, vec!["author".to_string()]);
        assert!(users[1].roles.is_empty());
        assert_eq!(repo.count().await.unwrap(), 2);

        assert!(repo.delete(a.id).await.unwrap());
        assert!(!repo.delete(a.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_token_lifecycle() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&input("a@example.com", vec![])).await.unwrap();
        let expires = Utc::now() + chrono::Duration::minutes(30);

        repo.set_reset_token(user.id, Some("tok"), Some(expires)).await.unwrap();
        let found = repo.get_by_reset_token("tok").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(found.reset_token_expires.is_some());

        repo.update_password(user.id, "new-hash").await.unwrap();
        assert!(repo.get_by_reset_token("tok").await.unwrap().is_none());
        let reloaded = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.hashed_password, "new-hash");
        assert!(reloaded.reset_token_expires.is_none());
    }

    #[tokio::test]
    async fn test_mfa_secret_and_last_login() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&input("a@example.com", vec![])).await.unwrap();

        repo.set_mfa_secret(user.id, Some("JBSWY3DPEHPK3PXP")).await.unwrap();
        repo.set_last_login(user.id, Utc::now()).await.unwrap();

        let reloaded = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(reloaded.mfa_enabled());
        assert!(reloaded.last_login_at.is_some());

        repo.set_mfa_secret(user.id, None).await.unwrap();
        assert!(!repo.get_by_id(user.id).await.unwrap().unwrap().mfa_enabled());
    }
}
