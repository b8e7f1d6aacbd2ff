//! Authentication service
//!
//! Registration, credential login with optional TOTP, token refresh,
//! password recovery and MFA enrollment.
//!
//! Failed logins are counted per email by a sliding-window limiter; once the
//! limit is reached further attempts are rejected until the window passes,
//! and a successful login clears the counter.

use crate::config::{RateLimitConfig, SecurityConfig};
use crate::db::is_unique_violation;
use crate::db::repositories::{RoleRepository, UserRepository};
use crate::models::{CreateUserInput, User, UserStatus, ROLE_ADMIN, ROLE_AUTHOR, ROLE_REVIEWER};
use crate::services::audit;
use crate::services::mfa::MfaService;
use crate::services::password::{check_password_policy, hash_password, verify_password};
use crate::services::rate_limiter::RateLimiter;
use crate::services::token::{TokenError, TokenPair, TokenService, TokenType};
use anyhow::Context;
use chrono::{Duration, Utc};
use data_encoding::BASE64URL_NOPAD;
use std::sync::Arc;

/// Number of random bytes in a password reset token
const RESET_TOKEN_BYTES: usize = 32;

/// Roles an anonymous caller may request for their own account
const SELF_SIGNUP_ROLES: [&str; 2] = [ROLE_AUTHOR, ROLE_REVIEWER];

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Role '{0}' cannot be requested at signup")]
    PrivilegedRole(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User inactive")]
    Inactive,

    #[error("MFA required")]
    MfaRequired,

    #[error("Too many failed login attempts")]
    RateLimited { retry_after: u64 },

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid or expired token")]
    InvalidResetToken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TokenError> for AuthServiceError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(msg) => AuthServiceError::InternalError(anyhow::anyhow!(msg)),
            _ => AuthServiceError::InvalidToken,
        }
    }
}

/// Registration request, shared by self-signup and admin user creation
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub status: UserStatus,
    pub role_ids: Vec<i64>,
    /// Role name, resolved and merged into `role_ids`
    pub role: Option<String>,
    pub mfa_enabled: bool,
}

impl RegisterInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }
}

/// TOTP provisioning data returned when MFA is switched on
#[derive(Debug, Clone)]
pub struct MfaSetup {
    pub uri: String,
    /// Base64 PNG of the provisioning URI, absent if rendering failed
    pub qr_code: Option<String>,
}

/// Newly created account
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    /// Provisioning URI when MFA was enabled at signup
    pub mfa_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub mfa_token: Option<String>,
}

/// User together with their effective permissions
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub permissions: Vec<String>,
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    role_repo: Arc<dyn RoleRepository>,
    tokens: TokenService,
    mfa: MfaService,
    login_limiter: RateLimiter,
    reset_ttl: Duration,
    min_password_length: usize,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        role_repo: Arc<dyn RoleRepository>,
        security: &SecurityConfig,
        rate_limit: &RateLimitConfig,
    ) -> Self {
        Self {
            user_repo,
            role_repo,
            tokens: TokenService::new(
                &security.secret_key,
                security.access_token_expire_minutes,
                security.refresh_token_expire_minutes,
            ),
            mfa: MfaService::new(security.mfa_issuer.clone()),
            login_limiter: RateLimiter::new(
                rate_limit.login_attempts,
                rate_limit.login_window_seconds,
            ),
            reset_ttl: Duration::minutes(security.password_reset_expire_minutes),
            min_password_length: security.min_password_length,
        }
    }

    /// Limiter tracking failed logins, exposed for periodic cleanup
    pub fn login_limiter(&self) -> &RateLimiter {
        &self.login_limiter
    }

    /// Create an account on behalf of an administrator.
    ///
    /// Without any requested role the account gets `author`. The very first
    /// account becomes a superuser and defaults to `admin` instead.
    pub async fn register(&self, input: RegisterInput) -> Result<Registration, AuthServiceError> {
        self.create_account(input, false).await
    }

    /// Public self-signup.
    ///
    /// Same as [`register`](Self::register), except that once any account
    /// exists only `author` and `reviewer` may be requested.
    pub async fn sign_up(&self, input: RegisterInput) -> Result<Registration, AuthServiceError> {
        self.create_account(input, true).await
    }

    async fn create_account(
        &self,
        input: RegisterInput,
        self_service: bool,
    ) -> Result<Registration, AuthServiceError> {
        let email = input.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AuthServiceError::ValidationError(
                "Invalid email address".to_string(),
            ));
        }
        check_password_policy(&input.password, self.min_password_length)
            .map_err(AuthServiceError::ValidationError)?;

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AuthServiceError::EmailTaken);
        }

        let is_first = self.user_repo.count().await.context("Failed to count users")? == 0;

        let mut role_ids = input.role_ids.clone();
        if let Some(name) = input.role.as_deref() {
            let role = self
                .role_repo
                .get_by_name(name)
                .await
                .context("Failed to resolve role")?
                .ok_or_else(|| AuthServiceError::ValidationError(format!("Unknown role: {}", name)))?;
            if !role_ids.contains(&role.id) {
                role_ids.push(role.id);
            }
        }
        if self_service && !is_first {
            self.check_self_signup_roles(&role_ids).await?;
        }
        if role_ids.is_empty() {
            let default_role = if is_first { ROLE_ADMIN } else { ROLE_AUTHOR };
            if let Some(role) = self
                .role_repo
                .get_by_name(default_role)
                .await
                .context("Failed to resolve default role")?
            {
                role_ids.push(role.id);
            }
        }

        let mfa_secret = input.mfa_enabled.then(|| self.mfa.generate_secret());
        let mfa_uri = match mfa_secret.as_deref() {
            Some(secret) => Some(self.mfa.provisioning_uri(secret, &email)?),
            None => None,
        };

        let hashed_password = hash_password(&input.password).context("Failed to hash password")?;

        let user = self
            .user_repo
            .create(&CreateUserInput {
                email: email.clone(),
                full_name: input.full_name,
                hashed_password,
                status: input.status,
                is_superuser: is_first,
                mfa_secret,
                role_ids,
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuthServiceError::EmailTaken
                } else {
                    AuthServiceError::InternalError(e.context("Failed to create user"))
                }
            })?;

        audit::record("user.registered", Some(user.id), &user.email);
        Ok(Registration { user, mfa_uri })
    }

    async fn check_self_signup_roles(&self, role_ids: &[i64]) -> Result<(), AuthServiceError> {
        for id in role_ids {
            let role = self
                .role_repo
                .get_by_id(*id)
                .await
                .context("Failed to resolve role")?;
            if let Some(role) = role {
                if !SELF_SIGNUP_ROLES.contains(&role.name.as_str()) {
                    return Err(AuthServiceError::PrivilegedRole(role.name));
                }
            }
        }
        Ok(())
    }

    /// Check credentials (and TOTP when enrolled) and issue a token pair
    pub async fn login(&self, input: LoginInput) -> Result<TokenPair, AuthServiceError> {
        let email = input.email.trim().to_lowercase();

        if let Some(retry_after) = self.login_limiter.blocked_for(&email).await {
            tracing::warn!(email = %email, retry_after, "Login rejected: too many failures");
            return Err(AuthServiceError::RateLimited { retry_after });
        }

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        {
            Some(user) => user,
            None => {
                self.login_limiter.record(&email).await;
                return Err(AuthServiceError::InvalidCredentials);
            }
        };

        if !verify_password(&input.password, &user.hashed_password)
            .context("Failed to verify password")?
        {
            self.login_limiter.record(&email).await;
            audit::record("auth.login_failed", Some(user.id), &email);
            return Err(AuthServiceError::InvalidCredentials);
        }

        if !user.can_login() {
            return Err(AuthServiceError::Inactive);
        }

        if let Some(secret) = user.mfa_secret.as_deref() {
            let code = input.mfa_token.as_deref().unwrap_or_default();
            if !self.mfa.verify(secret, &user.email, code)? {
                self.login_limiter.record(&email).await;
                return Err(AuthServiceError::MfaRequired);
            }
        }

        self.login_limiter.clear(&email).await;
        self.user_repo
            .set_last_login(user.id, Utc::now())
            .await
            .context("Failed to record login")?;

        audit::record("auth.login", Some(user.id), &user.email);
        Ok(self.tokens.issue_pair(user.id)?)
    }

    /// Exchange a refresh token for a new pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthServiceError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;
        let user_id = claims.user_id().ok_or(AuthServiceError::InvalidToken)?;

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to load user")?
            .ok_or(AuthServiceError::InvalidToken)?;
        if !user.can_login() {
            return Err(AuthServiceError::InvalidToken);
        }

        Ok(self.tokens.issue_pair(user.id)?)
    }

    /// Resolve the user behind an access token.
    ///
    /// Returns `InvalidToken` for bad tokens or deleted users and `Inactive`
    /// for deactivated accounts.
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AuthServiceError> {
        let claims = self.tokens.verify(access_token, TokenType::Access)?;
        let user_id = claims.user_id().ok_or(AuthServiceError::InvalidToken)?;

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to load user")?
            .ok_or(AuthServiceError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthServiceError::Inactive);
        }
        Ok(user)
    }

    /// Start password recovery.
    ///
    /// Succeeds whether or not the email exists; the token is only stored.
    pub async fn recover(&self, email: &str) -> Result<(), AuthServiceError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        else {
            tracing::debug!("Password recovery requested for unknown email");
            return Ok(());
        };

        let token = generate_reset_token()?;
        self.user_repo
            .set_reset_token(user.id, Some(&token), Some(Utc::now() + self.reset_ttl))
            .await
            .context("Failed to store reset token")?;

        audit::record("auth.recover_requested", Some(user.id), &user.email);
        Ok(())
    }

    /// Set a new password using a recovery token
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthServiceError> {
        if token.is_empty() {
            return Err(AuthServiceError::InvalidResetToken);
        }
        let user = self
            .user_repo
            .get_by_reset_token(token)
            .await
            .context("Failed to look up reset token")?
            .ok_or(AuthServiceError::InvalidResetToken)?;

        match user.reset_token_expires {
            Some(expires) if expires > Utc::now() => {}
            _ => return Err(AuthServiceError::InvalidResetToken),
        }

        check_password_policy(new_password, self.min_password_length)
            .map_err(AuthServiceError::ValidationError)?;

        let hashed = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user.id, &hashed)
            .await
            .context("Failed to update password")?;

        audit::record("auth.password_reset", Some(user.id), &user.email);
        Ok(())
    }

    /// The user with their effective permission codes
    pub async fn current_user(&self, user: User) -> Result<CurrentUser, AuthServiceError> {
        let permissions = if user.is_superuser {
            self.role_repo.list_permission_codes().await
        } else {
            self.role_repo.permissions_for_user(user.id).await
        }
        .context("Failed to resolve permissions")?;

        Ok(CurrentUser { user, permissions })
    }

    /// Generate and store a new TOTP secret, returning its provisioning URI
    pub async fn enable_mfa(&self, user: &User) -> Result<MfaSetup, AuthServiceError> {
        let secret = self.mfa.generate_secret();
        let uri = self.mfa.provisioning_uri(&secret, &user.email)?;
        let qr_code = match self.mfa.qr_code_base64(&secret, &user.email) {
            Ok(qr) => Some(qr),
            Err(e) => {
                tracing::warn!(user_id = user.id, error = %e, "Failed to render MFA QR code");
                None
            }
        };

        self.user_repo
            .set_mfa_secret(user.id, Some(&secret))
            .await
            .context("Failed to store MFA secret")?;

        audit::record("auth.mfa_enabled", Some(user.id), &user.email);
        Ok(MfaSetup { uri, qr_code })
    }

    /// Remove the TOTP secret after checking a current code
    pub async fn disable_mfa(&self, user: &User, code: &str) -> Result<(), AuthServiceError> {
        let Some(secret) = user.mfa_secret.as_deref() else {
            return Err(AuthServiceError::MfaRequired);
        };
        if !self.mfa.verify(secret, &user.email, code)? {
            return Err(AuthServiceError::MfaRequired);
        }

        self.user_repo
            .set_mfa_secret(user.id, None)
            .await
            .context("Failed to clear MFA secret")?;

        audit::record("auth.mfa_disabled", Some(user.id), &user.email);
        Ok(())
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[cfg(test)]
    pub(crate) fn mfa(&self) -> &MfaService {
        &self.mfa
    }
}

/// URL-safe token from 32 random bytes
fn generate_reset_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| anyhow::anyhow!("Failed to generate token: {}", e))?;
    Ok(BASE64URL_NOPAD.encode(&bytes))
}
