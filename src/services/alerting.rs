//! Operational alerts
//!
//! Alerts are always logged. When an alerting webhook is configured they are
//! also POSTed there as `{message, severity, context}`; delivery problems are
//! logged and swallowed.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const ALERT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;

    /// Unknown names map to `Error`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "debug" => Severity::Debug,
            "info" => Severity::Info,
            "warning" | "warn" => Severity::Warning,
            "critical" => Severity::Critical,
            _ => Severity::Error,
        })
    }
}

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    message: &'a str,
    severity: Severity,
    context: &'a Value,
}

#[derive(Clone)]
pub struct AlertManager {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl AlertManager {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(ALERT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
            client,
        }
    }

    #[cfg(test)]
    pub fn is_remote(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Log the alert and forward it to the webhook if one is configured
    pub async fn notify(&self, message: &str, severity: Severity, context: Value) {
        match severity {
            Severity::Debug => tracing::debug!(target: "alert", %context, "{}", message),
            Severity::Info => tracing::info!(target: "alert", %context, "{}", message),
            Severity::Warning => tracing::warn!(target: "alert", %context, "{}", message),
            Severity::Error | Severity::Critical => {
                tracing::error!(target: "alert", severity = %severity, %context, "{}", message)
            }
        }

        let Some(url) = self.webhook_url.as_deref() else {
            return;
        };

        let payload = AlertPayload {
            message,
            severity,
            context: &context,
        };
        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(status = %resp.status(), "Alert webhook rejected alert");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to deliver alert"),
        }
    }
}
