//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error envelope
//! - Authentication (bearer access token validation)
//! - Authorization (role guards)

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::observability::{Metrics, TrustedHosts};
use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxAnalyticsRepository, SqlxCategoryRepository, SqlxContentRepository, SqlxMediaRepository,
    SqlxNewsletterRepository, SqlxRoleRepository, SqlxSeoRepository, SqlxUserRepository,
    SqlxWebhookRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, ROLE_ADMIN, ROLE_AUTHOR, ROLE_EDITOR, ROLE_REVIEWER};
use crate::services::{
    create_search_backend, AlertManager, AnalyticsService, AuthService, AuthServiceError,
    ContentService, MediaService, NewsletterService, NotificationService, RateLimiter,
    RoleService, SeoService, UserService,
};

/// Role sets used by the route guards
pub const ADMINS: &[&str] = &[ROLE_ADMIN];
pub const EDITORS: &[&str] = &[ROLE_EDITOR, ROLE_ADMIN];
pub const AUTHORS: &[&str] = &[ROLE_AUTHOR, ROLE_EDITOR, ROLE_ADMIN];
pub const REVIEWERS: &[&str] = &[ROLE_REVIEWER, ROLE_EDITOR, ROLE_ADMIN];

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub role_service: Arc<RoleService>,
    pub content_service: Arc<ContentService>,
    pub media_service: Arc<MediaService>,
    pub seo_service: Arc<SeoService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub notification_service: Arc<NotificationService>,
    pub newsletter_service: Arc<NewsletterService>,
    /// Per-client request limiter
    pub request_limiter: RateLimiter,
    pub alerts: AlertManager,
    pub metrics: Arc<Metrics>,
    pub trusted_hosts: Arc<TrustedHosts>,
}

impl AppState {
    /// Wire repositories and services on top of a migrated pool
    pub fn build(config: Config, pool: DynDatabasePool) -> anyhow::Result<Self> {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let role_repo = SqlxRoleRepository::boxed(pool.clone());
        let content_repo = SqlxContentRepository::boxed(pool.clone());
        let webhook_repo = SqlxWebhookRepository::boxed(pool.clone());

        let cache = create_cache(&config.cache);
        let search = create_search_backend(&config.search)?;
        let trusted_hosts = TrustedHosts::new(&config.server.trusted_hosts)?;

        let notification_service = Arc::new(NotificationService::new(
            webhook_repo,
            config.notifications.newsletter_webhook_url.clone(),
            config.notifications.timeout_seconds,
        ));
        let seo_service = Arc::new(SeoService::new(
            SqlxSeoRepository::boxed(pool.clone()),
            content_repo.clone(),
            cache,
        ));
        let content_service = Arc::new(ContentService::new(
            content_repo,
            SqlxCategoryRepository::boxed(pool.clone()),
            search,
            seo_service.clone(),
            notification_service.clone(),
        ));

        Ok(Self {
            auth_service: Arc::new(AuthService::new(
                user_repo.clone(),
                role_repo.clone(),
                &config.security,
                &config.rate_limit,
            )),
            user_service: Arc::new(UserService::new(user_repo)),
            role_service: Arc::new(RoleService::new(role_repo)),
            content_service,
            media_service: Arc::new(MediaService::new(
                SqlxMediaRepository::boxed(pool.clone()),
                Arc::new(config.upload.clone()),
            )),
            seo_service,
            analytics_service: Arc::new(AnalyticsService::new(
                SqlxAnalyticsRepository::boxed(pool.clone()),
                config.analytics.enabled,
            )),
            newsletter_service: Arc::new(NewsletterService::new(
                SqlxNewsletterRepository::boxed(pool.clone()),
                notification_service.clone(),
            )),
            notification_service,
            request_limiter: RateLimiter::new(
                config.rate_limit.requests,
                config.rate_limit.window_seconds,
            ),
            alerts: AlertManager::new(config.alerting.webhook_url.clone()),
            metrics: Arc::new(Metrics::new()?),
            trusted_hosts: Arc::new(trusted_hosts),
            config: Arc::new(config),
            pool,
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// User attached to the request when a valid token was presented
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
    /// Seconds for the `Retry-After` header of 429 responses
    #[serde(skip)]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
            retry_after: None,
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        let mut error = Self::new(code, message);
        error.error.details = Some(details);
        error
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: u64) -> Self {
        let mut error = Self::new("RATE_LIMITED", message);
        error.retry_after = Some(retry_after);
        error
    }

    /// Log `err` and hide it behind a generic 500
    pub fn internal_error(err: &anyhow::Error) -> Self {
        tracing::error!(error = ?err, "Request failed");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self.retry_after;
        let mut response = (status, Json(self)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

/// JSON request body whose rejections use the `ApiError` envelope
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Extract the bearer token from the `Authorization` header
pub fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn auth_error(e: AuthServiceError) -> ApiError {
    match e {
        AuthServiceError::Inactive => ApiError::forbidden("User inactive"),
        AuthServiceError::InternalError(err) => ApiError::internal_error(&err),
        _ => ApiError::unauthorized("Could not validate credentials"),
    }
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state.auth_service.authenticate(token).await.map_err(auth_error)?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware; invalid tokens are treated as anonymous
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer_token(request.headers()) {
        if let Ok(user) = state.auth_service.authenticate(token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Role guard: superusers and holders of any role in `roles` pass
pub async fn require_roles(
    roles: &'static [&'static str],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.has_any_role(roles) {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}
