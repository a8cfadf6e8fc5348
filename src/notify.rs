//! Best-effort lifecycle webhooks.
//!
//! An external observer can be told when a job is queued, completes, or
//! fails. Delivery is fire-and-forget: a slow or broken observer must
//! never affect the job result, so every failure here is logged and
//! swallowed on purpose.

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::util::NOTIFY_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Queued,
    Complete,
    Error,
}

/// Wire shape of one webhook delivery. `detail` fields spread into the
/// top-level body, so it must be a JSON object.
#[derive(Debug, Serialize)]
pub struct LifecycleEvent {
    pub action: LifecycleAction,
    pub correlation_id: String,
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub detail: Value,
}

pub struct Notifier {
    endpoint: Option<String>,
    secret: Option<String>,
    client: Client,
}

impl Notifier {
    pub fn from_config(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            endpoint: config.observer_url.clone(),
            secret: config.observer_secret.clone(),
            client,
        }
    }

    /// Fire one lifecycle event at the observer, if one is configured.
    pub async fn notify(&self, action: LifecycleAction, correlation_id: &str, detail: Value) {
        let Some(endpoint) = &self.endpoint else {
            return;
        };

        let event = LifecycleEvent {
            action,
            correlation_id: correlation_id.to_string(),
            timestamp_ms: Utc::now().timestamp_millis(),
            detail,
        };

        let mut request = self.client.post(endpoint).json(&event);
        if let Some(secret) = &self.secret {
            request = request.header("X-Webhook-Secret", secret);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(?action, correlation_id, "lifecycle event delivered");
            }
            Ok(response) => {
                warn!(?action, status = %response.status(), "observer rejected lifecycle event");
            }
            Err(e) => {
                warn!(?action, error = %e, "lifecycle event delivery failed");
            }
        }
    }
}
