//! Data models
//!
//! This module contains the data structures shared by the repositories,
//! services and API handlers:
//! - Database entities (User, Role, ContentItem, MediaAsset, SeoMetadata, ...)
//! - Inputs for create/update operations
//! - Pagination helpers

mod analytics;
mod content;
mod media;
mod notification;
mod seo;
mod user;

pub use analytics::{AnalyticsEvent, AnalyticsSummary, Dashboard, NewAnalyticsEvent, PAGE_VIEW_EVENT};
pub use content::{
    default_media_role, Category, ContentFilter, ContentItem, ContentMediaLink, ContentVersion,
    CreateCategoryInput, CreateContentInput, ListParams, PagedResult, UpdateContentInput,
    WorkflowState,
};
pub use media::{CreateMediaInput, CreateVariantInput, MediaAsset, MediaType, MediaVariant};
pub use notification::{CreateWebhookInput, NewsletterSubscription, Webhook, WebhookStatus};
pub use seo::{SeoMetadata, SeoMetadataInput, SitemapEntry};
pub use user::{
    CreateRoleInput, CreateUserInput, Role, UpdateRoleInput, UpdateUserInput, User, UserStatus,
    ROLE_ADMIN, ROLE_AUTHOR, ROLE_EDITOR, ROLE_REVIEWER,
};
