//! User administration
//!
//! Listing, updating and deleting accounts. Account creation goes through
//! [`AuthService::register`](crate::services::AuthService::register) so
//! signup and admin creation share the same rules.

use crate::db::repositories::UserRepository;
use crate::models::{UpdateUserInput, User};
use crate::services::audit;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("User not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    pub async fn list(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list().await.context("Failed to list users")?)
    }

    pub async fn get(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        if let Some(name) = input.full_name.as_deref() {
            if name.chars().count() > 255 {
                return Err(UserServiceError::ValidationError(
                    "Full name must be at most 255 characters".to_string(),
                ));
            }
        }

        let user = self
            .user_repo
            .update(id, &input)
            .await
            .context("Failed to update user")?
            .ok_or(UserServiceError::NotFound)?;

        audit::record("user.updated", Some(actor.id), &format!("user:{}", id));
        Ok(user)
    }

    /// Delete another account; admins cannot delete themselves
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), UserServiceError> {
        if actor.id == id {
            return Err(UserServiceError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }

        let deleted = self
            .user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;
        if !deleted {
            return Err(UserServiceError::NotFound);
        }

        audit::record("user.deleted", Some(actor.id), &format!("user:{}", id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateUserInput, UserStatus};

    async fn setup_test_service() -> (Arc<dyn UserRepository>, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let repo = SqlxUserRepository::boxed(pool);
        (repo.clone(), UserService::new(repo))
    }

    async fn create_user(repo: &Arc<dyn UserRepository>, email: &str) -> User {
        repo.create(&CreateUserInput {
            email: email.to_string(),
            hashed_password: "hash".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_update_user() {
        let (repo, service) = setup_test_service().await;
        let admin = create_user(&repo, "admin@example.com").await;
        let user = create_user(&repo, "user@example.com").await;

        let updated = service
            .update(
                &admin,
                user.id,
                UpdateUserInput {
                    full_name: Some("Jane Doe".to_string()),
                    status: Some(UserStatus::Suspended),
                    is_active: Some(false),
                    role_ids: Some(vec![2, 999]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(updated.status, UserStatus::Suspended);
        assert!(!updated.is_active);
        // unknown role ids are ignored
        assert_eq!(updated.roles.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let (repo, service) = setup_test_service().await;
        let admin = create_user(&repo, "admin@example.com").await;

        let result = service.update(&admin, 999, UpdateUserInput::default()).await;
        assert!(matches!(result, Err(UserServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (repo, service) = setup_test_service().await;
        let admin = create_user(&repo, "admin@example.com").await;
        let user = create_user(&repo, "user@example.com").await;

        service.delete(&admin, user.id).await.unwrap();
        assert!(matches!(service.get(user.id).await, Err(UserServiceError::NotFound)));
        assert!(matches!(
            service.delete(&admin, user.id).await,
            Err(UserServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let (repo, service) = setup_test_service().await;
        let admin = create_user(&repo, "admin@example.com").await;

        assert!(matches!(
            service.delete(&admin, admin.id).await,
            Err(UserServiceError::ValidationError(_))
        ));
        assert_eq!(service.list().await.unwrap().len(), 1);
    }
}
