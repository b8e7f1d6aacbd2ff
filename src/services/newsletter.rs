//! Newsletter subscriptions

use crate::db::is_unique_violation;
use crate::db::repositories::NewsletterRepository;
use crate::models::NewsletterSubscription;
use crate::services::notification::{
    NotificationService, EVENT_NEWSLETTER_SUBSCRIBED, EVENT_NEWSLETTER_UNSUBSCRIBED,
};
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum NewsletterServiceError {
    #[error("Subscription not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NewsletterService {
    repo: Arc<dyn NewsletterRepository>,
    notifications: Arc<NotificationService>,
}

fn normalize_email(email: &str) -> Result<String, NewsletterServiceError> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(NewsletterServiceError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }
    Ok(email)
}

impl NewsletterService {
    pub fn new(repo: Arc<dyn NewsletterRepository>, notifications: Arc<NotificationService>) -> Self {
        Self { repo, notifications }
    }

    /// Subscribe, reactivating a lapsed subscription.
    ///
    /// An already active subscription is returned unchanged and no events
    /// are sent.
    pub async fn subscribe(
        &self,
        email: &str,
        source: Option<&str>,
    ) -> Result<NewsletterSubscription, NewsletterServiceError> {
        let email = normalize_email(email)?;

        let subscription = match self
            .repo
            .get_by_email(&email)
            .await
            .context("Failed to look up subscription")?
        {
            Some(existing) if existing.is_active => return Ok(existing),
            Some(existing) => self
                .repo
                .set_active(existing.id, true)
                .await
                .context("Failed to reactivate subscription")?
                .ok_or(NewsletterServiceError::NotFound)?,
            None => match self.repo.create(&email, source).await {
                Ok(created) => created,
                // lost a race with a concurrent subscribe
                Err(e) if is_unique_violation(&e) => self
                    .repo
                    .get_by_email(&email)
                    .await
                    .context("Failed to look up subscription")?
                    .ok_or(NewsletterServiceError::NotFound)?,
                Err(e) => return Err(e.context("Failed to create subscription").into()),
            },
        };

        self.notifications.notify_newsletter("subscribed", &subscription.email);
        self.notifications
            .dispatch(EVENT_NEWSLETTER_SUBSCRIBED, json!({ "email": subscription.email }))
            .await;
        tracing::info!(subscription_id = subscription.id, "Newsletter subscription active");
        Ok(subscription)
    }

    pub async fn unsubscribe(&self, email: &str) -> Result<(), NewsletterServiceError> {
        let email = normalize_email(email)?;
        let subscription = self
            .repo
            .get_by_email(&email)
            .await
            .context("Failed to look up subscription")?
            .ok_or(NewsletterServiceError::NotFound)?;

        self.repo
            .set_active(subscription.id, false)
            .await
            .context("Failed to deactivate subscription")?;

        self.notifications.notify_newsletter("unsubscribed", &subscription.email);
        self.notifications
            .dispatch(EVENT_NEWSLETTER_UNSUBSCRIBED, json!({ "email": subscription.email }))
            .await;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<NewsletterSubscription>, NewsletterServiceError> {
        Ok(self.repo.list().await.context("Failed to list subscriptions")?)
    }
}
