//! HTTP client for the engine's REST endpoints.

use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::engine::JobHandle;
use crate::error::{FerryError, Result};
use crate::util::{
    CONNECT_TIMEOUT, HISTORY_TIMEOUT, READY_PROBE_PAUSE, READY_PROBE_TIMEOUT, SUBMIT_TIMEOUT,
    UPLOAD_TIMEOUT,
};
use crate::workflow::Graph;

/// Field names engines have used for the submission id.
const CORRELATION_KEYS: [&str; 4] = ["prompt_id", "job_id", "correlation_id", "id"];

pub struct EngineClient {
    base: String,
    client: Client,
}

impl EngineClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(SUBMIT_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("ferry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FerryError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base: config.http_base(),
            client,
        })
    }

    /// Submit a canonical graph, returning the engine's correlation id.
    ///
    /// Rejections keep the engine's raw status and body. No retry here:
    /// a failed submission is terminal for the invocation.
    pub async fn submit(&self, graph: &Graph, session_token: &str) -> Result<JobHandle> {
        let response = self
            .client
            .post(format!("{}/prompt", self.base))
            .json(&json!({
                "prompt": graph,
                "client_id": session_token,
            }))
            .send()
            .await
            .map_err(|e| FerryError::Transport {
                detail: format!("submission failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FerryError::Submission { status, body });
        }

        let body: Value = response.json().await.map_err(|e| FerryError::Transport {
            detail: format!("invalid submission response: {e}"),
        })?;

        let correlation_id = CORRELATION_KEYS
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or(FerryError::MissingCorrelationId)?;

        debug!(correlation_id, "job submitted");

        Ok(JobHandle {
            correlation_id,
            session_token: session_token.to_string(),
        })
    }

    /// Fetch the history record for a submission, if the engine has one.
    ///
    /// The endpoint returns `{}` (or a record keyed by another id) until
    /// the job finishes, which reads as `None` here.
    pub async fn history(&self, correlation_id: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base, correlation_id))
            .timeout(HISTORY_TIMEOUT)
            .send()
            .await
            .map_err(|e| FerryError::Transport {
                detail: format!("history fetch failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(FerryError::Transport {
                detail: format!("history fetch returned {}", response.status()),
            });
        }

        let body: Value = response.json().await.map_err(|e| FerryError::Transport {
            detail: format!("invalid history response: {e}"),
        })?;

        Ok(body
            .get(correlation_id)
            .filter(|record| record.as_object().is_some_and(|o| !o.is_empty()))
            .cloned())
    }

    /// Probe `/system_stats` until the engine answers or the budget runs out.
    ///
    /// Readiness is advisory: callers log the outcome but proceed either way.
    pub async fn readiness(&self, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        let url = format!("{}/system_stats", self.base);

        loop {
            let probe = self
                .client
                .get(&url)
                .timeout(READY_PROBE_TIMEOUT)
                .send()
                .await;
            if matches!(probe, Ok(ref response) if response.status().is_success()) {
                return true;
            }
            if Instant::now() + READY_PROBE_PAUSE >= deadline {
                return false;
            }
            tokio::time::sleep(READY_PROBE_PAUSE).await;
        }
    }

    /// Stage one input image on the engine before submission.
    pub async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let part = Part::bytes(bytes).file_name(name.to_string());
        let form = Form::new()
            .part("image", part)
            .text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.base))
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| FerryError::ImageUpload {
                name: name.to_string(),
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FerryError::ImageUpload {
                name: name.to_string(),
                detail: format!("engine returned {status}: {body}"),
            });
        }

        Ok(())
    }
}
