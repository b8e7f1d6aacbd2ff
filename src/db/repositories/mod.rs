//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one aggregate.

pub mod analytics;
pub mod category;
pub mod content;
pub mod media;
pub mod newsletter;
pub mod role;
pub mod seo;
pub mod user;
pub mod webhook;

pub use analytics::{AnalyticsRepository, SqlxAnalyticsRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use content::{ContentRepository, SqlxContentRepository};
pub use media::{MediaRepository, SqlxMediaRepository};
pub use newsletter::{NewsletterRepository, SqlxNewsletterRepository};
pub use role::{RoleRepository, SqlxRoleRepository};
pub use seo::{SeoRepository, SqlxSeoRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use webhook::{SqlxWebhookRepository, WebhookRepository};
