//! User, role and permission administration
//!
//! All routes require the admin role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::auth::{auth_error, SignupRequest};
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{CreateRoleInput, Role, UpdateRoleInput, UpdateUserInput, User, UserStatus};
use crate::services::{RoleServiceError, UserServiceError};

/// Public view of a user account
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub status: UserStatus,
    pub is_active: bool,
    pub is_superuser: bool,
    pub mfa_enabled: bool,
    pub roles: Vec<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            mfa_enabled: user.mfa_enabled(),
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            status: user.status,
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            roles: user.roles,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub status: Option<UserStatus>,
    pub is_active: Option<bool>,
    pub role_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub description: Option<String>,
    pub permission_codes: Option<Vec<String>>,
}

fn user_error(e: UserServiceError) -> ApiError {
    match e {
        UserServiceError::NotFound => ApiError::not_found("User not found"),
        UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        UserServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

fn role_error(e: RoleServiceError) -> ApiError {
    match e {
        RoleServiceError::NotFound => ApiError::not_found("Role not found"),
        RoleServiceError::RoleExists(name) => {
            ApiError::conflict(format!("Role '{}' already exists", name))
        }
        RoleServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        RoleServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", patch(update_user).delete(delete_user))
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/{id}", patch(update_role))
        .route("/permissions", get(list_permissions))
}

/// GET /api/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.user_service.list().await.map_err(user_error)?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/users
async fn create_user(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = state
        .auth_service
        .register(body.into())
        .await
        .map_err(auth_error)?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(registration.user))))
}

/// PATCH /api/users/{id}
async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .user_service
        .update(
            &actor,
            id,
            UpdateUserInput {
                full_name: body.full_name,
                status: body.status,
                is_active: body.is_active,
                role_ids: body.role_ids,
            },
        )
        .await
        .map_err(user_error)?;
    Ok(Json(user.into()))
}

/// DELETE /api/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .delete(&actor, id)
        .await
        .map_err(user_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/roles
async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.role_service.list().await.map_err(role_error)?))
}

/// POST /api/roles
async fn create_role(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = state
        .role_service
        .create(
            &actor,
            CreateRoleInput {
                name: body.name,
                description: body.description,
                permission_codes: body.permission_codes,
            },
        )
        .await
        .map_err(role_error)?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// PATCH /api/roles/{id}
async fn update_role(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateRoleRequest>,
) -> Result<Json<Role>, ApiError> {
    let role = state
        .role_service
        .update(
            &actor,
            id,
            UpdateRoleInput {
                description: body.description,
                permission_codes: body.permission_codes,
            },
        )
        .await
        .map_err(role_error)?;
    Ok(Json(role))
}

/// GET /api/permissions
async fn list_permissions(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(
        state.role_service.list_permissions().await.map_err(role_error)?,
    ))
}
