//! Role and permission repository

use crate::db::DynDatabasePool;
use crate::models::{CreateRoleInput, Role, UpdateRoleInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// All roles with their permission codes, ordered by name
    async fn list(&self) -> Result<Vec<Role>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Role>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Create a role; unknown permission codes are skipped
    async fn create(&self, input: &CreateRoleInput) -> Result<Role>;

    async fn update(&self, id: i64, input: &UpdateRoleInput) -> Result<Option<Role>>;

    /// Every permission code, ordered
    async fn list_permission_codes(&self) -> Result<Vec<String>>;

    /// Union of the permission codes of all the user's roles
    async fn permissions_for_user(&self, user_id: i64) -> Result<Vec<String>>;
}

pub struct SqlxRoleRepository {
    pool: DynDatabasePool,
}

impl SqlxRoleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RoleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RoleRepository for SqlxRoleRepository {
    async fn list(&self) -> Result<Vec<Role>> {
        list_roles(self.pool.sqlite()).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get role by ID")?;
        load_role(self.pool.sqlite(), row).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get role by name")?;
        load_role(self.pool.sqlite(), row).await
    }

    async fn create(&self, input: &CreateRoleInput) -> Result<Role> {
        let pool = self.pool.sqlite();
        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        let result = sqlx::query("INSERT INTO roles (name, description) VALUES (?, ?)")
            .bind(&input.name)
            .bind(&input.description)
            .execute(&mut *tx)
            .await
            .context("Failed to create role")?;
        let id = result.last_insert_rowid();

        for code in &input.permission_codes {
            grant_permission(&mut tx, id, code).await?;
        }

        tx.commit().await.context("Failed to commit role")?;

        self.get_by_id(id).await?.context("Created role disappeared")
    }

    async fn update(&self, id: i64, input: &UpdateRoleInput) -> Result<Option<Role>> {
        let pool = self.pool.sqlite();
        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        let result = sqlx::query("UPDATE roles SET description = COALESCE(?, description) WHERE id = ?")
            .bind(&input.description)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update role")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(codes) = &input.permission_codes {
            sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear role permissions")?;
            for code in codes {
                grant_permission(&mut tx, id, code).await?;
            }
        }

        tx.commit().await.context("Failed to commit role update")?;
        self.get_by_id(id).await
    }

    async fn list_permission_codes(&self) -> Result<Vec<String>> {
        let codes: Vec<String> = sqlx::query_scalar("SELECT code FROM permissions ORDER BY code")
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list permissions")?;
        Ok(codes)
    }

    async fn permissions_for_user(&self, user_id: i64) -> Result<Vec<String>> {
        let codes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.code FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            INNER JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = ?
            ORDER BY p.code
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to resolve user permissions")?;
        Ok(codes)
    }
}

async fn grant_permission(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    role_id: i64,
    code: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO role_permissions (role_id, permission_id) SELECT ?, id FROM permissions WHERE code = ?",
    )
    .bind(role_id)
    .bind(code)
    .execute(&mut **tx)
    .await
    .context("Failed to grant permission")?;
    Ok(())
}

async fn role_permission_codes(pool: &SqlitePool, role_id: i64) -> Result<Vec<String>> {
    let codes: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT p.code FROM permissions p
        INNER JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = ?
        ORDER BY p.code
        "#,
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
    .context("Failed to load role permissions")?;
    Ok(codes)
}

async fn load_role(pool: &SqlitePool, row: Option<sqlx::sqlite::SqliteRow>) -> Result<Option<Role>> {
    match row {
        Some(row) => {
            let mut role = row_to_role(&row);
            role.permissions = role_permission_codes(pool, role.id).await?;
            Ok(Some(role))
        }
        None => Ok(None),
    }
}

async fn list_roles(pool: &SqlitePool) -> Result<Vec<Role>> {
    let rows = sqlx::query("SELECT id, name, description FROM roles ORDER BY name")
        .fetch_all(pool)
        .await
        .context("Failed to list roles")?;

    let grants = sqlx::query(
        r#"
        SELECT rp.role_id, p.code FROM role_permissions rp
        INNER JOIN permissions p ON p.id = rp.permission_id
        ORDER BY p.code
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to load role permissions")?;

    let mut codes_by_role: HashMap<i64, Vec<String>> = HashMap::new();
    for row in grants {
        codes_by_role
            .entry(row.get("role_id"))
            .or_default()
            .push(row.get("code"));
    }

    Ok(rows
        .iter()
        .map(|row| {
            let mut role = row_to_role(row);
            role.permissions = codes_by_role.remove(&role.id).unwrap_or_default();
            role
        })
        .collect())
}

fn row_to_role(row: &sqlx::sqlite::SqliteRow) -> Role {
    Role {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        permissions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxRoleRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxRoleRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_list_seeded_roles() {
        let (_pool, repo) = setup_test_repo().await;
        let roles = repo.list().await.unwrap();

        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "author", "editor", "reviewer"]);

        let author = roles.iter().find(|r| r.name == "author").unwrap();
        assert_eq!(author.permissions, vec!["content.read", "content.write"]);
    }

    #[tokio::test]
    async fn test_create_role_skips_unknown_codes() {
        let (_pool, repo) = setup_test_repo().await;

        let role = repo
            .create(&CreateRoleInput {
                name: "analyst".to_string(),
                description: Some("Reads numbers".to_string()),
                permission_codes: vec!["analytics.view".to_string(), "does.not.exist".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(role.name, "analyst");
        assert_eq!(role.permissions, vec!["analytics.view"]);
    }

    #[tokio::test]
    async fn test_duplicate_role_name() {
        let (_pool, repo) = setup_test_repo().await;
        let err = repo
            .create(&CreateRoleInput {
                name: "admin".to_string(),
                ..CreateRoleInput::default()
            })
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_update_role_permissions() {
        let (_pool, repo) = setup_test_repo().await;
        let reviewer = repo.get_by_name("reviewer").await.unwrap().unwrap();

        let updated = repo
            .update(
                reviewer.id,
                &UpdateRoleInput {
                    description: None,
                    permission_codes: Some(vec!["content.read".to_string(), "seo.manage".to_string()]),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.description, reviewer.description);
        assert_eq!(updated.permissions, vec!["content.read", "seo.manage"]);
        assert!(repo.update(999, &UpdateRoleInput::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_permissions_for_user_is_union() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.sqlite();

        sqlx::query("INSERT INTO users (email, hashed_password) VALUES ('u@example.com', 'x')")
            .execute(sqlite)
            .await
            .unwrap();
        let author = repo.get_by_name("author").await.unwrap().unwrap();
        let reviewer = repo.get_by_name("reviewer").await.unwrap().unwrap();
        for role_id in [author.id, reviewer.id] {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (1, ?)")
                .bind(role_id)
                .execute(sqlite)
                .await
                .unwrap();
        }

        let codes = repo.permissions_for_user(1).await.unwrap();
        assert_eq!(codes, vec!["content.read", "content.write"]);
        assert_eq!(repo.list_permission_codes().await.unwrap().len(), 7);
    }
}
