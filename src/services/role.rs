//! Role and permission management

use crate::db::is_unique_violation;
use crate::db::repositories::RoleRepository;
use crate::models::{CreateRoleInput, Role, UpdateRoleInput, User};
use crate::services::audit;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RoleServiceError {
    #[error("Role not found")]
    NotFound,

    #[error("Role '{0}' already exists")]
    RoleExists(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct RoleService {
    role_repo: Arc<dyn RoleRepository>,
}

impl RoleService {
    pub fn new(role_repo: Arc<dyn RoleRepository>) -> Self {
        Self { role_repo }
    }

    pub async fn list(&self) -> Result<Vec<Role>, RoleServiceError> {
        Ok(self.role_repo.list().await.context("Failed to list roles")?)
    }

    pub async fn create(&self, actor: &User, input: CreateRoleInput) -> Result<Role, RoleServiceError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(RoleServiceError::ValidationError(
                "Role name cannot be empty".to_string(),
            ));
        }
        let input = CreateRoleInput {
            name: name.to_string(),
            ..input
        };

        let role = self.role_repo.create(&input).await.map_err(|e| {
            if is_unique_violation(&e) {
                RoleServiceError::RoleExists(input.name.clone())
            } else {
                RoleServiceError::InternalError(e.context("Failed to create role"))
            }
        })?;

        audit::record("role.created", Some(actor.id), &role.name);
        Ok(role)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateRoleInput,
    ) -> Result<Role, RoleServiceError> {
        let role = self
            .role_repo
            .update(id, &input)
            .await
            .context("Failed to update role")?
            .ok_or(RoleServiceError::NotFound)?;

        audit::record("role.updated", Some(actor.id), &role.name);
        Ok(role)
    }

    pub async fn list_permissions(&self) -> Result<Vec<String>, RoleServiceError> {
        Ok(self
            .role_repo
            .list_permission_codes()
            .await
            .context("Failed to list permissions")?)
    }
}
