//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories:
//! validation, authorization decisions that depend on data, workflow side
//! effects and outbound notifications.

pub mod alerting;
pub mod analytics;
pub mod audit;
pub mod auth;
pub mod content;
pub mod media;
pub mod mfa;
pub mod newsletter;
pub mod notification;
pub mod password;
pub mod rate_limiter;
pub mod role;
pub mod search;
pub mod seo;
pub mod token;
pub mod user;

pub use alerting::{AlertManager, Severity};
pub use analytics::{AnalyticsService, AnalyticsServiceError, TrackEvent};
pub use auth::{
    AuthService, AuthServiceError, CurrentUser, LoginInput, MfaSetup, RegisterInput, Registration,
};
pub use content::{
    generate_slug, ContentChanges, ContentDetail, ContentService, ContentServiceError, NewContent,
};
pub use media::{MediaService, MediaServiceError};
pub use mfa::MfaService;
pub use newsletter::{NewsletterService, NewsletterServiceError};
pub use notification::{NotificationService, NotificationServiceError};
pub use password::{hash_password, verify_password};
pub use rate_limiter::{RateDecision, RateLimiter};
pub use role::{RoleService, RoleServiceError};
pub use search::{create_search_backend, SearchBackend};
pub use seo::{SeoService, SeoServiceError};
pub use token::{TokenPair, TokenService, TokenType};
pub use user::{UserService, UserServiceError};
