//! WebSocket completion monitor.
//!
//! Connects to the engine's event stream and follows one job to a
//! terminal state. The stream is not reliable: engines restart, proxies
//! drop idle connections, and frames for other sessions can interleave.
//! The monitor reconnects on failure up to a configured bound, with the
//! wall-clock deadline enforced across every state.
//!
//! Consecutive-failure accounting: the counter rises on every failed
//! connect or dropped stream and resets to zero once a connection is
//! established, so a long job surviving occasional drops is fine while
//! a dead engine fails fast.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::config::Config;
use crate::engine::monitor::{remaining_or_deadline, CompletionMonitor};
use crate::engine::{Completion, JobHandle, NodeOutput};
use crate::error::{FerryError, Result};
use crate::util::{CONNECT_TIMEOUT, STREAM_RECV_TIMEOUT};

/// Engine event frames this monitor reacts to. Everything else (progress
/// ticks, previews, crystools telemetry) collapses into `Other`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamMessage {
    Executed {
        #[serde(default)]
        data: ExecutedData,
    },
    ExecutionError {
        #[serde(default)]
        data: Value,
    },
    Status {
        #[serde(default)]
        data: StatusData,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ExecutedData {
    #[serde(default)]
    node: Option<Value>,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    prompt_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    #[serde(default)]
    status: Value,
}

pub struct StreamMonitor {
    endpoint: String,
    max_execution: Duration,
    reconnect_delay: Duration,
    max_reconnects: u32,
}

impl StreamMonitor {
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint: config.ws_endpoint(),
            max_execution: config.max_execution,
            reconnect_delay: config.reconnect_delay,
            max_reconnects: config.max_reconnects,
        }
    }

    /// Record a connect or stream failure. Errors once the consecutive
    /// count passes the configured bound.
    fn note_failure(&self, failures: &mut u32, detail: &str) -> Result<()> {
        *failures += 1;
        if *failures > self.max_reconnects {
            return Err(FerryError::ReconnectsExhausted {
                attempts: *failures,
            });
        }
        warn!(
            attempt = *failures,
            max = self.max_reconnects,
            detail,
            "event stream failure, reconnecting"
        );
        Ok(())
    }

    async fn backoff(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(self.reconnect_delay.min(remaining)).await;
    }
}

#[async_trait]
impl CompletionMonitor for StreamMonitor {
    async fn wait(&self, job: &JobHandle) -> Result<Completion> {
        let url = format!("{}?clientId={}", self.endpoint, job.session_token);
        let deadline = Instant::now() + self.max_execution;
        let mut outputs: Vec<NodeOutput> = Vec::new();
        let mut failures: u32 = 0;

        'session: loop {
            let remaining = remaining_or_deadline(deadline, self.max_execution)?;

            let connected =
                timeout(CONNECT_TIMEOUT.min(remaining), connect_async(url.as_str())).await;
            let mut socket = match connected {
                Ok(Ok((socket, _response))) => {
                    debug!("event stream connected");
                    failures = 0;
                    socket
                }
                Ok(Err(e)) => {
                    self.note_failure(&mut failures, &e.to_string())?;
                    self.backoff(deadline).await;
                    continue 'session;
                }
                Err(_) => {
                    self.note_failure(&mut failures, "connect timed out")?;
                    self.backoff(deadline).await;
                    continue 'session;
                }
            };

            loop {
                let remaining = remaining_or_deadline(deadline, self.max_execution)?;

                let frame = match timeout(STREAM_RECV_TIMEOUT.min(remaining), socket.next()).await
                {
                    // Liveness tick: nothing arrived, deadline re-checked above.
                    Err(_) => continue,
                    Ok(None) => {
                        self.note_failure(&mut failures, "stream ended")?;
                        self.backoff(deadline).await;
                        continue 'session;
                    }
                    Ok(Some(Err(e))) => {
                        self.note_failure(&mut failures, &e.to_string())?;
                        self.backoff(deadline).await;
                        continue 'session;
                    }
                    Ok(Some(Ok(frame))) => frame,
                };

                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => {
                        self.note_failure(&mut failures, "server closed the stream")?;
                        self.backoff(deadline).await;
                        continue 'session;
                    }
                    // Binary previews and control frames carry no events.
                    _ => continue,
                };

                let message: StreamMessage = match serde_json::from_str(&text) {
                    Ok(message) => message,
                    Err(_) => continue,
                };

                match message {
                    StreamMessage::Executed { data } => {
                        if for_other_job(data.prompt_id.as_deref(), &job.correlation_id) {
                            continue;
                        }
                        // Bypassed nodes emit executed events with a null payload.
                        if data.output.is_null() {
                            continue;
                        }
                        outputs.push(NodeOutput {
                            node: node_label(&data.node),
                            output: data.output,
                        });
                    }
                    StreamMessage::ExecutionError { data } => {
                        if let Some(prompt_id) = data.get("prompt_id").and_then(Value::as_str) {
                            if prompt_id != job.correlation_id {
                                continue;
                            }
                        }
                        return Err(FerryError::EngineExecution {
                            detail: execution_error_detail(&data),
                        });
                    }
                    StreamMessage::Status { data } => {
                        if is_terminal_status(&data.status, !outputs.is_empty()) {
                            debug!(outputs = outputs.len(), "job reached terminal status");
                            return Ok(Completion {
                                outputs,
                                history: None,
                            });
                        }
                    }
                    StreamMessage::Other => {}
                }
            }
        }
    }
}

/// Executed frames tagged with a different job's id are ignored.
/// Untagged frames are attributed to our job (older engines omit the id).
fn for_other_job(prompt_id: Option<&str>, correlation_id: &str) -> bool {
    prompt_id.is_some_and(|id| id != correlation_id)
}

fn node_label(node: &Option<Value>) -> String {
    match node {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Shared with the polling monitor, which finds the same payload inside
/// history records.
pub(crate) fn execution_error_detail(data: &Value) -> String {
    let message = data.get("exception_message").and_then(Value::as_str);
    let node_type = data.get("node_type").and_then(Value::as_str);
    match (node_type, message) {
        (Some(node_type), Some(message)) => format!("{node_type}: {message}"),
        (None, Some(message)) => message.to_string(),
        _ => data.to_string(),
    }
}

/// Terminal when the engine says `finished` outright, or when its queue
/// drains after at least one executed output.
///
/// The second signal alone is not enough: the status frame sent on
/// connect can already report an empty queue, before our job started.
fn is_terminal_status(status: &Value, saw_output: bool) -> bool {
    if status.as_str() == Some("finished") {
        return true;
    }
    let queue_remaining = status
        .get("exec_info")
        .and_then(|info| info.get("queue_remaining"))
        .and_then(Value::as_u64);
    saw_output && queue_remaining == Some(0)
}
