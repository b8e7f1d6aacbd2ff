//! Webhook and newsletter models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookStatus::Active => write!(f, "active"),
            WebhookStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for WebhookStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(WebhookStatus::Active),
            "inactive" => Ok(WebhookStatus::Inactive),
            _ => Err(anyhow::anyhow!("Invalid webhook status: {}", s)),
        }
    }
}

/// Outbound HTTP endpoint notified about content and newsletter events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub name: String,
    pub target_url: String,
    /// HMAC key for the signature header
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub status: WebhookStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateWebhookInput {
    pub name: String,
    pub target_url: String,
    pub secret: Option<String>,
    pub status: WebhookStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterSubscription {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}
