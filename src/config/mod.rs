//! Configuration management
//!
//! This module handles loading and parsing configuration for the Lavamedia CMS.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Secret key shipped in the default configuration.
pub const DEFAULT_SECRET_KEY: &str = "CHANGE_ME";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application identity
    #[serde(default)]
    pub app: AppConfig,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token, password and MFA settings
    #[serde(default)]
    pub security: SecurityConfig,
    /// Request rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Response security headers
    #[serde(default)]
    pub headers: HeadersConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Search backend
    #[serde(default)]
    pub search: SearchConfig,
    /// Outbound notifications
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Operational alerts
    #[serde(default)]
    pub alerting: AlertingConfig,
    /// Analytics collection
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Application identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Deployment environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_environment(),
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_app_name() -> String {
    "Lavamedia CMS".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins ("*" allows any origin)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Accepted Host header values; empty accepts every host
    #[serde(default)]
    pub trusted_hosts: Vec<String>,
    /// Peers allowed to supply X-Forwarded-For / X-Real-IP
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            trusted_hosts: Vec::new(),
            trusted_proxies: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or URL (`:memory:` for an in-memory database)
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/lavamedia.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Token, password and MFA settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// HMAC key for signing access and refresh tokens
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_access_token_expire_minutes")]
    pub access_token_expire_minutes: i64,
    #[serde(default = "default_refresh_token_expire_minutes")]
    pub refresh_token_expire_minutes: i64,
    /// Issuer shown in authenticator apps
    #[serde(default = "default_mfa_issuer")]
    pub mfa_issuer: String,
    #[serde(default = "default_password_reset_expire_minutes")]
    pub password_reset_expire_minutes: i64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            access_token_expire_minutes: default_access_token_expire_minutes(),
            refresh_token_expire_minutes: default_refresh_token_expire_minutes(),
            mfa_issuer: default_mfa_issuer(),
            password_reset_expire_minutes: default_password_reset_expire_minutes(),
            min_password_length: default_min_password_length(),
        }
    }
}

fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.to_string()
}

fn default_access_token_expire_minutes() -> i64 {
    30
}

fn default_refresh_token_expire_minutes() -> i64 {
    60 * 24 * 14
}

fn default_mfa_issuer() -> String {
    "Lavamedia".to_string()
}

fn default_password_reset_expire_minutes() -> i64 {
    60
}

fn default_min_password_length() -> usize {
    8
}

/// Request rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per client IP per window
    #[serde(default = "default_rate_limit_requests")]
    pub requests: u32,
    #[serde(default = "default_rate_limit_window")]
    pub window_seconds: u64,
    /// Failed logins allowed per email per login window
    #[serde(default = "default_login_attempts")]
    pub login_attempts: u32,
    #[serde(default = "default_login_window")]
    pub login_window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_rate_limit_requests(),
            window_seconds: default_rate_limit_window(),
            login_attempts: default_login_attempts(),
            login_window_seconds: default_login_window(),
        }
    }
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_login_attempts() -> u32 {
    5
}

fn default_login_window() -> u64 {
    15 * 60
}

/// Response security headers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeadersConfig {
    #[serde(default)]
    pub content_security_policy: Option<String>,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory uploaded files are written to
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix the upload directory is served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Maximum file size in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    20 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
        "image/svg+xml".to_string(),
        "video/mp4".to_string(),
        "video/webm".to_string(),
        "audio/mpeg".to_string(),
        "audio/ogg".to_string(),
        "application/pdf".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension from MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "audio/mpeg" => "mp3",
            "audio/ogg" => "ogg",
            "application/pdf" => "pdf",
            _ => "bin",
        }
    }
}

/// Search backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    /// Database title matching only
    #[default]
    None,
    /// Meilisearch over HTTP
    Meilisearch,
}

/// Search backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub provider: SearchProvider,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_search_index")]
    pub index: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProvider::default(),
            url: None,
            api_key: None,
            index: default_search_index(),
        }
    }
}

fn default_search_index() -> String {
    "content".to_string()
}

/// Outbound notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Receives newsletter subscribe/unsubscribe events
    #[serde(default)]
    pub newsletter_webhook_url: Option<String>,
    #[serde(default = "default_notification_timeout")]
    pub timeout_seconds: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            newsletter_webhook_url: None,
            timeout_seconds: default_notification_timeout(),
        }
    }
}

fn default_notification_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertingConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Every key can be overridden with `LAVAMEDIA_<SECTION>_<KEY>`, for example
    /// `LAVAMEDIA_SERVER_PORT`, `LAVAMEDIA_SECURITY_REFRESH_TOKEN_EXPIRE_MINUTES`
    /// or `LAVAMEDIA_ANALYTICS_ENABLED`. List keys are comma separated, booleans
    /// accept true/false/1/0/yes/no/on/off, and an empty value clears an
    /// optional key. Values that fail to parse are ignored.
    ///
    /// The merged configuration is validated before it is returned.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        override_string("LAVAMEDIA_APP_NAME", &mut self.app.name);
        override_string("LAVAMEDIA_APP_ENVIRONMENT", &mut self.app.environment);

        // Server configuration
        override_string("LAVAMEDIA_SERVER_HOST", &mut self.server.host);
        override_parsed("LAVAMEDIA_SERVER_PORT", &mut self.server.port);
        override_list("LAVAMEDIA_SERVER_ALLOWED_ORIGINS", &mut self.server.allowed_origins);
        override_list("LAVAMEDIA_SERVER_TRUSTED_HOSTS", &mut self.server.trusted_hosts);
        override_list("LAVAMEDIA_SERVER_TRUSTED_PROXIES", &mut self.server.trusted_proxies);

        // Database and cache
        override_string("LAVAMEDIA_DATABASE_URL", &mut self.database.url);
        override_parsed("LAVAMEDIA_DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections);
        override_parsed("LAVAMEDIA_CACHE_TTL_SECONDS", &mut self.cache.ttl_seconds);
        override_parsed("LAVAMEDIA_CACHE_MAX_CAPACITY", &mut self.cache.max_capacity);

        // Security configuration
        let security = &mut self.security;
        override_string("LAVAMEDIA_SECURITY_SECRET_KEY", &mut security.secret_key);
        override_parsed(
            "LAVAMEDIA_SECURITY_ACCESS_TOKEN_EXPIRE_MINUTES",
            &mut security.access_token_expire_minutes,
        );
        override_parsed(
            "LAVAMEDIA_SECURITY_REFRESH_TOKEN_EXPIRE_MINUTES",
            &mut security.refresh_token_expire_minutes,
        );
        override_string("LAVAMEDIA_SECURITY_MFA_ISSUER", &mut security.mfa_issuer);
        override_parsed(
            "LAVAMEDIA_SECURITY_PASSWORD_RESET_EXPIRE_MINUTES",
            &mut security.password_reset_expire_minutes,
        );
        override_parsed(
            "LAVAMEDIA_SECURITY_MIN_PASSWORD_LENGTH",
            &mut security.min_password_length,
        );

        // Rate limiting
        let rate_limit = &mut self.rate_limit;
        override_parsed("LAVAMEDIA_RATE_LIMIT_REQUESTS", &mut rate_limit.requests);
        override_parsed("LAVAMEDIA_RATE_LIMIT_WINDOW_SECONDS", &mut rate_limit.window_seconds);
        override_parsed("LAVAMEDIA_RATE_LIMIT_LOGIN_ATTEMPTS", &mut rate_limit.login_attempts);
        override_parsed(
            "LAVAMEDIA_RATE_LIMIT_LOGIN_WINDOW_SECONDS",
            &mut rate_limit.login_window_seconds,
        );

        override_optional(
            "LAVAMEDIA_HEADERS_CONTENT_SECURITY_POLICY",
            &mut self.headers.content_security_policy,
        );

        // Uploads
        override_parsed("LAVAMEDIA_UPLOAD_PATH", &mut self.upload.path);
        override_string("LAVAMEDIA_UPLOAD_PUBLIC_PREFIX", &mut self.upload.public_prefix);
        override_parsed("LAVAMEDIA_UPLOAD_MAX_FILE_SIZE", &mut self.upload.max_file_size);
        override_list("LAVAMEDIA_UPLOAD_ALLOWED_TYPES", &mut self.upload.allowed_types);

        // Search backend; a URL alone selects meilisearch
        if std::env::var("LAVAMEDIA_SEARCH_URL").is_ok_and(|url| !url.is_empty()) {
            self.search.provider = SearchProvider::Meilisearch;
        }
        override_optional("LAVAMEDIA_SEARCH_URL", &mut self.search.url);
        override_optional("LAVAMEDIA_SEARCH_API_KEY", &mut self.search.api_key);
        override_string("LAVAMEDIA_SEARCH_INDEX", &mut self.search.index);
        override_parsed("LAVAMEDIA_SEARCH_PROVIDER", &mut self.search.provider);

        // Outbound hooks
        override_optional(
            "LAVAMEDIA_NOTIFICATIONS_NEWSLETTER_WEBHOOK_URL",
            &mut self.notifications.newsletter_webhook_url,
        );
        override_parsed(
            "LAVAMEDIA_NOTIFICATIONS_TIMEOUT_SECONDS",
            &mut self.notifications.timeout_seconds,
        );
        override_optional("LAVAMEDIA_ALERTING_WEBHOOK_URL", &mut self.alerting.webhook_url);

        override_bool("LAVAMEDIA_ANALYTICS_ENABLED", &mut self.analytics.enabled);
        override_parsed("LAVAMEDIA_LOGGING_FORMAT", &mut self.logging.format);
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.secret_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "security.secret_key must not be empty".to_string(),
            ));
        }
        if self.app.is_production() && self.security.secret_key == DEFAULT_SECRET_KEY {
            return Err(ConfigError::ValidationError(
                "security.secret_key must be changed in production".to_string(),
            ));
        }
        if self.security.access_token_expire_minutes <= 0
            || self.security.refresh_token_expire_minutes <= 0
        {
            return Err(ConfigError::ValidationError(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.rate_limit.window_seconds == 0 || self.rate_limit.login_window_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "rate limit windows must be at least one second".to_string(),
            ));
        }
        if self.search.provider == SearchProvider::Meilisearch && self.search.url.is_none() {
            return Err(ConfigError::ValidationError(
                "search.url is required for the meilisearch provider".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the shipped placeholder secret is still in use
    pub fn uses_default_secret(&self) -> bool {
        self.security.secret_key == DEFAULT_SECRET_KEY
    }
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn override_parsed<T: FromStr>(key: &str, target: &mut T) {
    if let Some(value) = std::env::var(key).ok().and_then(|v| v.trim().parse().ok()) {
        *target = value;
    }
}

fn override_optional(key: &str, target: &mut Option<String>) {
    if let Ok(value) = std::env::var(key) {
        *target = Some(value).filter(|v| !v.trim().is_empty());
    }
}

fn override_bool(key: &str, target: &mut bool) {
    let Ok(value) = std::env::var(key) else {
        return;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *target = true,
        "0" | "false" | "no" | "off" => *target = false,
        _ => {}
    }
}

/// Comma separated list; the override is skipped if any entry fails to parse
fn override_list<T: FromStr>(key: &str, target: &mut Vec<T>) {
    let Ok(value) = std::env::var(key) else {
        return;
    };
    let parsed: Result<Vec<T>, _> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect();
    if let Ok(items) = parsed {
        *target = items;
    }
}

impl FromStr for SearchProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "meilisearch" => Ok(Self::Meilisearch),
            other => Err(ConfigError::ValidationError(format!(
                "unknown search provider '{}'",
                other
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::ValidationError(format!(
                "unknown log format '{}'",
                other
            ))),
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "LAVAMEDIA_APP_NAME",
    "LAVAMEDIA_APP_ENVIRONMENT",
    "LAVAMEDIA_SERVER_HOST",
    "LAVAMEDIA_SERVER_PORT",
    "LAVAMEDIA_SERVER_ALLOWED_ORIGINS",
    "LAVAMEDIA_SERVER_TRUSTED_HOSTS",
    "LAVAMEDIA_SERVER_TRUSTED_PROXIES",
    "LAVAMEDIA_DATABASE_URL",
    "LAVAMEDIA_DATABASE_MAX_CONNECTIONS",
    "LAVAMEDIA_CACHE_TTL_SECONDS",
    "LAVAMEDIA_CACHE_MAX_CAPACITY",
    "LAVAMEDIA_SECURITY_SECRET_KEY",
    "LAVAMEDIA_SECURITY_ACCESS_TOKEN_EXPIRE_MINUTES",
    "LAVAMEDIA_SECURITY_REFRESH_TOKEN_EXPIRE_MINUTES",
    "LAVAMEDIA_SECURITY_MFA_ISSUER",
    "LAVAMEDIA_SECURITY_PASSWORD_RESET_EXPIRE_MINUTES",
    "LAVAMEDIA_SECURITY_MIN_PASSWORD_LENGTH",
    "LAVAMEDIA_RATE_LIMIT_REQUESTS",
    "LAVAMEDIA_RATE_LIMIT_WINDOW_SECONDS",
    "LAVAMEDIA_RATE_LIMIT_LOGIN_ATTEMPTS",
    "LAVAMEDIA_RATE_LIMIT_LOGIN_WINDOW_SECONDS",
    "LAVAMEDIA_HEADERS_CONTENT_SECURITY_POLICY",
    "LAVAMEDIA_UPLOAD_PATH",
    "LAVAMEDIA_UPLOAD_PUBLIC_PREFIX",
    "LAVAMEDIA_UPLOAD_MAX_FILE_SIZE",
    "LAVAMEDIA_UPLOAD_ALLOWED_TYPES",
    "LAVAMEDIA_SEARCH_PROVIDER",
    "LAVAMEDIA_SEARCH_URL",
    "LAVAMEDIA_SEARCH_API_KEY",
    "LAVAMEDIA_SEARCH_INDEX",
    "LAVAMEDIA_NOTIFICATIONS_NEWSLETTER_WEBHOOK_URL",
    "LAVAMEDIA_NOTIFICATIONS_TIMEOUT_SECONDS",
    "LAVAMEDIA_ALERTING_WEBHOOK_URL",
    "LAVAMEDIA_ANALYTICS_ENABLED",
    "LAVAMEDIA_LOGGING_FORMAT",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        let guard = super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        for key in super::ENV_KEYS {
            std::env::remove_var(key);
        }
        guard
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.app.name, "Lavamedia CMS");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.database.url, "data/lavamedia.db");
        assert_eq!(config.security.access_token_expire_minutes, 30);
        assert_eq!(config.security.refresh_token_expire_minutes, 20160);
        assert_eq!(config.security.mfa_issuer, "Lavamedia");
        assert_eq!(config.rate_limit.requests, 100);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.search.provider, SearchProvider::None);
        assert!(config.analytics.enabled);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.headers.content_security_policy.is_none());
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 3000\nsecurity:\n  secret_key: s3cret\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.security.secret_key, "s3cret");
        assert_eq!(config.security.min_password_length, 8);
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"
app:
  name: "Newsroom"
  environment: staging
server:
  host: "127.0.0.1"
  port: 9000
  allowed_origins: ["https://cms.example.com"]
  trusted_hosts: ["cms.example.com", "*.example.org"]
database:
  url: "/var/lib/lavamedia/cms.db"
  max_connections: 5
security:
  secret_key: "very-secret"
  access_token_expire_minutes: 15
rate_limit:
  requests: 10
  window_seconds: 30
headers:
  content_security_policy: "default-src 'self'"
search:
  provider: meilisearch
  url: "http://localhost:7700"
logging:
  format: json
analytics:
  enabled: false
"#).unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.app.name, "Newsroom");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.trusted_hosts.len(), 2);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.security.access_token_expire_minutes, 15);
        assert_eq!(config.rate_limit.requests, 10);
        assert_eq!(
            config.headers.content_security_policy.as_deref(),
            Some("default-src 'self'")
        );
        assert_eq!(config.search.provider, SearchProvider::Meilisearch);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.analytics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let result = Config::load(file.path());

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("parse"));
    }

    #[test]
    fn test_load_malformed_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  host: [invalid yaml").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = Config::default();
        config.security.secret_key = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_rejects_default_secret_in_production() {
        let mut config = Config::default();
        config.app.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.security.secret_key = "rotated".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = Config::default();
        config.rate_limit.window_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_search_url() {
        let mut config = Config::default();
        config.search.provider = SearchProvider::Meilisearch;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upload_type_checks() {
        let upload = UploadConfig::default();
        assert!(upload.is_type_allowed("image/png"));
        assert!(!upload.is_type_allowed("application/x-msdownload"));
        assert_eq!(upload.get_extension("video/mp4"), "mp4");
        assert_eq!(upload.get_extension("text/plain"), "bin");
    }

    #[test]
    fn test_env_override_server_config() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  host: \"0.0.0.0\"\n  port: 8080\n").unwrap();

        std::env::set_var("LAVAMEDIA_SERVER_HOST", "192.168.1.1");
        std::env::set_var("LAVAMEDIA_SERVER_PORT", "4000");
        std::env::set_var(
            "LAVAMEDIA_SERVER_ALLOWED_ORIGINS",
            "https://a.example.com, https://b.example.com",
        );

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(
            config.server.allowed_origins,
            vec!["https://a.example.com".to_string(), "https://b.example.com".to_string()]
        );

        std::env::remove_var("LAVAMEDIA_SERVER_HOST");
        std::env::remove_var("LAVAMEDIA_SERVER_PORT");
        std::env::remove_var("LAVAMEDIA_SERVER_ALLOWED_ORIGINS");
    }

    #[test]
    fn test_env_override_security_and_search() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();

        std::env::set_var("LAVAMEDIA_SECURITY_SECRET_KEY", "from-env");
        std::env::set_var("LAVAMEDIA_SEARCH_URL", "http://search:7700");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.security.secret_key, "from-env");
        assert_eq!(config.search.provider, SearchProvider::Meilisearch);
        assert_eq!(config.search.url.as_deref(), Some("http://search:7700"));

        std::env::remove_var("LAVAMEDIA_SECURITY_SECRET_KEY");
        std::env::remove_var("LAVAMEDIA_SEARCH_URL");
    }

    #[test]
    fn test_env_override_invalid_port_ignored() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8080\n").unwrap();

        std::env::set_var("LAVAMEDIA_SERVER_PORT", "not_a_number");

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);

        std::env::remove_var("LAVAMEDIA_SERVER_PORT");
    }

    #[test]
    fn test_env_override_fails_validation() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();

        std::env::set_var("LAVAMEDIA_APP_ENVIRONMENT", "production");

        assert!(Config::load_with_env(file.path()).is_err());

        std::env::remove_var("LAVAMEDIA_APP_ENVIRONMENT");
    }

    #[test]
    fn test_env_override_bool_and_nested_numeric_keys() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "analytics:\n  enabled: true\n").unwrap();

        std::env::set_var("LAVAMEDIA_ANALYTICS_ENABLED", "false");
        std::env::set_var("LAVAMEDIA_SECURITY_REFRESH_TOKEN_EXPIRE_MINUTES", "90");
        std::env::set_var("LAVAMEDIA_RATE_LIMIT_LOGIN_ATTEMPTS", "3");

        let config = Config::load_with_env(file.path()).unwrap();

        assert!(!config.analytics.enabled);
        assert_eq!(config.security.refresh_token_expire_minutes, 90);
        assert_eq!(config.rate_limit.login_attempts, 3);

        std::env::set_var("LAVAMEDIA_ANALYTICS_ENABLED", "maybe");
        let config = Config::load_with_env(file.path()).unwrap();
        assert!(config.analytics.enabled);

        std::env::remove_var("LAVAMEDIA_ANALYTICS_ENABLED");
        std::env::remove_var("LAVAMEDIA_SECURITY_REFRESH_TOKEN_EXPIRE_MINUTES");
        std::env::remove_var("LAVAMEDIA_RATE_LIMIT_LOGIN_ATTEMPTS");
    }

    #[test]
    fn test_env_override_enums_paths_and_optionals() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "headers:\n  content_security_policy: \"default-src 'self'\"\n").unwrap();

        std::env::set_var("LAVAMEDIA_LOGGING_FORMAT", "JSON");
        std::env::set_var("LAVAMEDIA_SECURITY_MFA_ISSUER", "Newsroom");
        std::env::set_var("LAVAMEDIA_UPLOAD_PATH", "/srv/uploads");
        std::env::set_var("LAVAMEDIA_HEADERS_CONTENT_SECURITY_POLICY", "");
        std::env::set_var("LAVAMEDIA_SEARCH_PROVIDER", "elasticsearch");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.security.mfa_issuer, "Newsroom");
        assert_eq!(config.upload.path, PathBuf::from("/srv/uploads"));
        assert!(config.headers.content_security_policy.is_none());
        assert_eq!(config.search.provider, SearchProvider::None);

        for key in [
            "LAVAMEDIA_LOGGING_FORMAT",
            "LAVAMEDIA_SECURITY_MFA_ISSUER",
            "LAVAMEDIA_UPLOAD_PATH",
            "LAVAMEDIA_HEADERS_CONTENT_SECURITY_POLICY",
            "LAVAMEDIA_SEARCH_PROVIDER",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_override_trusted_proxies() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  trusted_proxies: [\"10.0.0.1\"]\n").unwrap();

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.trusted_proxies, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);

        std::env::set_var("LAVAMEDIA_SERVER_TRUSTED_PROXIES", "127.0.0.1, ::1");
        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.trusted_proxies.len(), 2);

        std::env::set_var("LAVAMEDIA_SERVER_TRUSTED_PROXIES", "127.0.0.1,not-an-ip");
        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.trusted_proxies, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);

        std::env::remove_var("LAVAMEDIA_SERVER_TRUSTED_PROXIES");
    }
}
