//! Webhook management and event dispatch
//!
//! Events are delivered to every active webhook as
//! `{"event": .., "data": .., "sent_at": ..}`. Webhooks with a secret get an
//! `X-Lavamedia-Signature: sha256=<hex>` header holding the HMAC-SHA256 of
//! the exact request body. Delivery runs in a background task and failures
//! are only logged.

use crate::db::repositories::WebhookRepository;
use crate::models::{CreateWebhookInput, User, Webhook, WebhookStatus};
use crate::services::audit;
use anyhow::Context;
use chrono::Utc;
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const SIGNATURE_HEADER: &str = "X-Lavamedia-Signature";

pub const EVENT_CONTENT_PUBLISHED: &str = "content.published";
pub const EVENT_CONTENT_ARCHIVED: &str = "content.archived";
pub const EVENT_NEWSLETTER_SUBSCRIBED: &str = "newsletter.subscribed";
pub const EVENT_NEWSLETTER_UNSUBSCRIBED: &str = "newsletter.unsubscribed";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum NotificationServiceError {
    #[error("Webhook not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// `sha256=<hex HMAC-SHA256(secret, body)>`
pub fn sign_payload(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
    mac.update(body);
    Ok(format!("sha256={}", HEXLOWER.encode(&mac.finalize().into_bytes())))
}

fn validate_target_url(target_url: &str) -> Result<(), NotificationServiceError> {
    let url = reqwest::Url::parse(target_url).map_err(|_| {
        NotificationServiceError::ValidationError("target_url must be a valid URL".to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NotificationServiceError::ValidationError(
            "target_url must use http or https".to_string(),
        ));
    }
    Ok(())
}

pub struct NotificationService {
    webhook_repo: Arc<dyn WebhookRepository>,
    client: reqwest::Client,
    newsletter_webhook_url: Option<String>,
}

impl NotificationService {
    pub fn new(
        webhook_repo: Arc<dyn WebhookRepository>,
        newsletter_webhook_url: Option<String>,
        timeout_seconds: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            webhook_repo,
            client,
            newsletter_webhook_url: newsletter_webhook_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub async fn list_webhooks(&self) -> Result<Vec<Webhook>, NotificationServiceError> {
        Ok(self.webhook_repo.list().await.context("Failed to list webhooks")?)
    }

    pub async fn create_webhook(
        &self,
        actor: &User,
        input: CreateWebhookInput,
    ) -> Result<Webhook, NotificationServiceError> {
        if input.name.trim().is_empty() {
            return Err(NotificationServiceError::ValidationError(
                "Webhook name cannot be empty".to_string(),
            ));
        }
        validate_target_url(&input.target_url)?;

        let input = CreateWebhookInput {
            name: input.name.trim().to_string(),
            secret: input.secret.filter(|s| !s.is_empty()),
            ..input
        };
        let webhook = self
            .webhook_repo
            .create(&input)
            .await
            .context("Failed to create webhook")?;

        audit::record("webhook.created", Some(actor.id), &webhook.target_url);
        Ok(webhook)
    }

    pub async fn update_status(
        &self,
        actor: &User,
        id: i64,
        status: WebhookStatus,
    ) -> Result<Webhook, NotificationServiceError> {
        let webhook = self
            .webhook_repo
            .set_status(id, status)
            .await
            .context("Failed to update webhook")?
            .ok_or(NotificationServiceError::NotFound)?;

        audit::record("webhook.status_changed", Some(actor.id), &format!("webhook:{}", id));
        Ok(webhook)
    }

    pub async fn delete_webhook(&self, actor: &User, id: i64) -> Result<(), NotificationServiceError> {
        if !self
            .webhook_repo
            .delete(id)
            .await
            .context("Failed to delete webhook")?
        {
            return Err(NotificationServiceError::NotFound);
        }
        audit::record("webhook.deleted", Some(actor.id), &format!("webhook:{}", id));
        Ok(())
    }

    /// Send `event` to every active webhook in the background.
    ///
    /// Returns the delivery task, or `None` when nothing is subscribed.
    pub async fn dispatch(&self, event: &str, data: Value) -> Option<JoinHandle<()>> {
        let webhooks = match self.webhook_repo.list_active().await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                tracing::error!(error = ?e, event, "Failed to load webhooks");
                return None;
            }
        };
        if webhooks.is_empty() {
            return None;
        }

        let payload = json!({
            "event": event,
            "data": data,
            "sent_at": Utc::now(),
        });
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, event, "Failed to encode webhook payload");
                return None;
            }
        };

        let client = self.client.clone();
        let event = event.to_string();
        Some(tokio::spawn(async move {
            let deliveries = webhooks
                .iter()
                .map(|webhook| deliver(&client, webhook, &event, body.clone()));
            futures::future::join_all(deliveries).await;
        }))
    }

    /// POST a newsletter event to the configured newsletter webhook, if any
    pub fn notify_newsletter(&self, event: &str, email: &str) -> Option<JoinHandle<()>> {
        let url = self.newsletter_webhook_url.clone()?;
        let client = self.client.clone();
        let payload = json!({ "event": event, "email": email });

        Some(tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!(status = %resp.status(), "Newsletter webhook rejected event");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to notify newsletter webhook"),
            }
        }))
    }
}

async fn deliver(client: &reqwest::Client, webhook: &Webhook, event: &str, body: Vec<u8>) {
    let mut request = client
        .post(&webhook.target_url)
        .header(reqwest::header::CONTENT_TYPE, "application/json");

    if let Some(secret) = webhook.secret.as_deref() {
        match sign_payload(secret, &body) {
            Ok(signature) => request = request.header(SIGNATURE_HEADER, signature),
            Err(e) => {
                tracing::error!(webhook_id = webhook.id, error = ?e, "Failed to sign webhook payload");
                return;
            }
        }
    }

    match request.body(body).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!(webhook_id = webhook.id, event, "Webhook delivered");
        }
        Ok(resp) => {
            tracing::warn!(webhook_id = webhook.id, event, status = %resp.status(), "Webhook rejected event");
        }
        Err(e) => {
            tracing::warn!(webhook_id = webhook.id, event, error = %e, "Webhook delivery failed");
        }
    }
}
