//! Job orchestration.
//!
//! One invocation drives at most one job: normalize, submit, monitor,
//! resolve, package, clean up. Every exit path, including panics-free
//! error handling, produces a [`ResultEnvelope`] so callers never see a
//! raw failure shape.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::artifact::{cleanup_outputs, package, resolve};
use crate::config::Config;
use crate::engine::{monitor_for_mode, EngineClient};
use crate::envelope::{JobInput, JobRequest, ResultEnvelope};
use crate::error::{FerryError, Result};
use crate::notify::{LifecycleAction, Notifier};
use crate::workflow::{normalize, WorkflowSource};

/// Process one job request end to end. Always returns an envelope.
#[instrument(skip_all)]
pub async fn handle(request: Value, config: &Config) -> ResultEnvelope {
    let request: JobRequest = match serde_json::from_value(request) {
        Ok(request) => request,
        Err(e) => {
            return ResultEnvelope::failure(
                &FerryError::InvalidInput {
                    reason: e.to_string(),
                },
                None,
            )
        }
    };

    // Liveness echo: no engine traffic, no webhooks.
    if request.input.wants_health() {
        return ResultEnvelope::ok();
    }

    let notifier = Notifier::from_config(config);
    let mut submitted: Option<String> = None;

    match execute(&request.input, config, &notifier, &mut submitted).await {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(code = error.code(), "job failed: {error}");
            let webhook_ref = submitted
                .clone()
                .or_else(|| request.id.clone())
                .unwrap_or_default();
            notifier
                .notify(
                    LifecycleAction::Error,
                    &webhook_ref,
                    json!({"code": error.code(), "message": error.to_string()}),
                )
                .await;
            ResultEnvelope::failure(&error, submitted)
        }
    }
}

/// The fallible middle of [`handle`]. Records the engine's correlation id
/// into `submitted` as soon as it exists, so the error path can report it.
async fn execute(
    input: &JobInput,
    config: &Config,
    notifier: &Notifier,
    submitted: &mut Option<String>,
) -> Result<ResultEnvelope> {
    let workflow_value = input.workflow.as_ref().ok_or(FerryError::MissingWorkflow)?;
    let source = WorkflowSource::from_request(workflow_value)?;
    let raw = source.load(&config.workflows_dir).await?;
    let graph = normalize(&raw)?;
    info!(workflow = %source.label(), nodes = graph.len(), "workflow normalized");

    let client = EngineClient::new(config)?;

    if input.wants_dry_run() {
        let engine_ready = client.readiness(config.ready_timeout).await;
        return Ok(ResultEnvelope::dry_run(source.label(), engine_ready));
    }

    // Advisory probe: a cold engine usually finishes booting while the
    // submission makes its way over, so a miss is logged, not fatal.
    if !client.readiness(config.ready_timeout).await {
        warn!("engine not ready after probe window, submitting anyway");
    }

    let session_token = input
        .client_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    for image in &input.images {
        let bytes =
            decode_image_payload(&image.image).map_err(|detail| FerryError::ImageUpload {
                name: image.name.clone(),
                detail,
            })?;
        client.upload_image(&image.name, bytes).await?;
        info!(name = %image.name, "input image staged");
    }

    let job = client.submit(&graph, &session_token).await?;
    *submitted = Some(job.correlation_id.clone());
    notifier
        .notify(
            LifecycleAction::Queued,
            &job.correlation_id,
            json!({"workflow": source.label()}),
        )
        .await;

    let monitor = monitor_for_mode(config)?;
    let completion = monitor.wait(&job).await?;

    let descriptors = resolve(&completion, &config.output_dir);
    let artifacts = package(&descriptors, config).await?;
    let removed = cleanup_outputs(&descriptors, config);
    info!(artifacts = artifacts.len(), removed, "job finished");

    notifier
        .notify(
            LifecycleAction::Complete,
            &job.correlation_id,
            json!({"artifacts": artifacts.len()}),
        )
        .await;

    Ok(ResultEnvelope::success(job.correlation_id, artifacts))
}

/// Accept a plain base64 string or a full data URI.
fn decode_image_payload(payload: &str) -> std::result::Result<Vec<u8>, String> {
    let encoded = match payload.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))
}
