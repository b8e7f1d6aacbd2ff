//! Authentication API endpoints
//!
//! - POST /api/auth/signup - Create an account
//! - POST /api/auth/login - Exchange credentials for tokens
//! - POST /api/auth/refresh - Exchange a refresh token for a new pair
//! - POST /api/auth/logout - Advisory logout
//! - POST /api/auth/recover - Start password recovery
//! - POST /api/auth/reset - Set a new password with a recovery token
//! - GET /api/auth/me - Current user and permissions
//! - POST /api/auth/mfa/enable, /api/auth/mfa/disable - TOTP enrollment

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::MessageResponse;
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser, OptionalUser};
use crate::api::users::UserResponse;
use crate::models::UserStatus;
use crate::services::{audit, AuthServiceError, LoginInput, RegisterInput, TokenPair};

/// Request body for signup and admin user creation
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub role_ids: Vec<i64>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub mfa_enabled: bool,
}

impl From<SignupRequest> for RegisterInput {
    fn from(body: SignupRequest) -> Self {
        Self {
            email: body.email,
            password: body.password,
            full_name: body.full_name,
            status: body.status,
            role_ids: body.role_ids,
            role: body.role,
            mfa_enabled: body.mfa_enabled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub mfa_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct MfaCodeRequest {
    pub mfa_token: String,
}

#[derive(Debug, Serialize)]
pub struct MfaUriResponse {
    pub mfa_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

/// Current user with effective permissions
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub permissions: Vec<String>,
}

/// Map auth service errors to API errors
pub(crate) fn auth_error(e: AuthServiceError) -> ApiError {
    match e {
        AuthServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        AuthServiceError::EmailTaken => ApiError::validation_error("Email already registered"),
        AuthServiceError::PrivilegedRole(role) => {
            ApiError::forbidden(format!("Role '{}' is assigned by an administrator", role))
        }
        AuthServiceError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
        AuthServiceError::Inactive => ApiError::forbidden("User inactive"),
        AuthServiceError::MfaRequired => ApiError::forbidden("MFA required"),
        AuthServiceError::RateLimited { retry_after } => {
            ApiError::rate_limited("Too many failed login attempts", retry_after)
        }
        AuthServiceError::InvalidToken => ApiError::unauthorized("Could not validate credentials"),
        AuthServiceError::InvalidResetToken => ApiError::bad_request("Invalid or expired token"),
        AuthServiceError::InternalError(err) => ApiError::internal_error(&err),
    }
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/recover", post(recover))
        .route("/reset", post(reset))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/mfa/enable", post(enable_mfa))
        .route("/mfa/disable", post(disable_mfa))
}

/// POST /api/auth/signup
async fn signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = state
        .auth_service
        .sign_up(body.into())
        .await
        .map_err(auth_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: registration.user.id,
            mfa_uri: registration.mfa_uri,
        }),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = state
        .auth_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
            mfa_token: body.mfa_token,
        })
        .await
        .map_err(auth_error)?;
    Ok(Json(tokens))
}

/// POST /api/auth/refresh
async fn refresh(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = state
        .auth_service
        .refresh(&body.refresh_token)
        .await
        .map_err(|e| match e {
            AuthServiceError::InternalError(err) => ApiError::internal_error(&err),
            _ => ApiError::unauthorized("Invalid refresh token"),
        })?;
    Ok(Json(tokens))
}

/// POST /api/auth/logout
///
/// Tokens are stateless; this only records the event for a valid caller.
async fn logout(OptionalUser(user): OptionalUser) -> StatusCode {
    if let Some(user) = user {
        audit::record("auth.logout", Some(user.id), &user.email);
    }
    StatusCode::NO_CONTENT
}

/// POST /api/auth/recover
async fn recover(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RecoverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .auth_service
        .recover(&body.email)
        .await
        .map_err(auth_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If the email exists, recovery instructions were sent.",
        )),
    ))
}

/// POST /api/auth/reset
async fn reset(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth_service
        .reset_password(&body.token, &body.new_password)
        .await
        .map_err(auth_error)?;
    Ok(Json(MessageResponse::new("Password updated")))
}

/// GET /api/auth/me
async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MeResponse>, ApiError> {
    let current = state
        .auth_service
        .current_user(user)
        .await
        .map_err(auth_error)?;

    Ok(Json(MeResponse {
        user: current.user.into(),
        permissions: current.permissions,
    }))
}

/// POST /api/auth/mfa/enable
async fn enable_mfa(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MfaUriResponse>, ApiError> {
    let setup = state
        .auth_service
        .enable_mfa(&user)
        .await
        .map_err(auth_error)?;
    Ok(Json(MfaUriResponse {
        mfa_uri: setup.uri,
        qr_code: setup.qr_code,
    }))
}

/// POST /api/auth/mfa/disable
async fn disable_mfa(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<MfaCodeRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .auth_service
        .disable_mfa(&user, &body.mfa_token)
        .await
        .map_err(auth_error)?;
    Ok(StatusCode::NO_CONTENT)
}
