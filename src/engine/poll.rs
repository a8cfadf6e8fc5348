//! Polling completion monitor.
//!
//! Fallback for deployments where the WebSocket stream is blocked or
//! flaky: ask the history endpoint about the job until a record appears.
//! A populated record is terminal by definition, so there is no separate
//! state machine here, just a bounded sleep between asks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::engine::client::EngineClient;
use crate::engine::monitor::{remaining_or_deadline, CompletionMonitor};
use crate::engine::stream::execution_error_detail;
use crate::engine::{Completion, JobHandle};
use crate::error::{FerryError, Result};

pub struct PollMonitor {
    client: EngineClient,
    max_execution: Duration,
    poll_interval: Duration,
}

impl PollMonitor {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: EngineClient::new(config)?,
            max_execution: config.max_execution,
            poll_interval: config.poll_interval,
        })
    }
}

#[async_trait]
impl CompletionMonitor for PollMonitor {
    async fn wait(&self, job: &JobHandle) -> Result<Completion> {
        let deadline = Instant::now() + self.max_execution;

        loop {
            let remaining = remaining_or_deadline(deadline, self.max_execution)?;

            match self.client.history(&job.correlation_id).await {
                Ok(Some(record)) => {
                    if let Some(detail) = record_error(&record) {
                        return Err(FerryError::EngineExecution { detail });
                    }
                    return Ok(Completion {
                        outputs: Vec::new(),
                        history: Some(record),
                    });
                }
                Ok(None) => {}
                // Transient fetch failures ride out the deadline.
                Err(e) => debug!(error = %e, "history poll failed"),
            }

            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

/// Extract an execution failure from a history record, if it holds one.
///
/// Error records carry `status.status_str == "error"` and usually an
/// `execution_error` entry in `status.messages` with the real detail.
fn record_error(record: &Value) -> Option<String> {
    let status = record.get("status")?;
    if status.get("status_str").and_then(Value::as_str) != Some("error") {
        return None;
    }

    let detail = status
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|messages| {
            messages.iter().find_map(|entry| {
                let pair = entry.as_array()?;
                if pair.first()?.as_str()? != "execution_error" {
                    return None;
                }
                pair.get(1).map(execution_error_detail)
            })
        })
        .unwrap_or_else(|| status.to_string());

    Some(detail)
}
