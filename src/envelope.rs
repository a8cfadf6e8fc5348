//! Request and result envelopes.
//!
//! Requests arrive as loosely-typed JSON from the queue runtime. Results
//! always leave as a [`ResultEnvelope`], whether the job succeeded or not,
//! so callers never have to branch on a transport error shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::SerializedArtifact;
use crate::error::FerryError;
use crate::util::is_truthy;

/// Top-level job request as delivered by the queue runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRequest {
    /// Queue-assigned job id, if the runtime provides one.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub input: JobInput,
}

/// The caller-controlled `input` block of a job request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobInput {
    /// Workflow reference: an inline graph, a raw JSON string, or a file name.
    #[serde(default)]
    pub workflow: Option<Value>,

    /// Input images to stage on the engine before submission.
    #[serde(default)]
    pub images: Vec<InputImage>,

    /// Validate and report readiness without submitting.
    #[serde(default)]
    pub dry_run: Option<Value>,

    /// Health-check flags. Either spelling short-circuits the handler.
    #[serde(default)]
    pub health: Option<Value>,
    #[serde(default)]
    pub ping: Option<Value>,

    /// Caller-chosen session token for the event stream.
    #[serde(default)]
    pub client_id: Option<String>,
}

fn flag(value: &Option<Value>) -> bool {
    value.as_ref().is_some_and(is_truthy)
}

impl JobInput {
    pub fn wants_health(&self) -> bool {
        flag(&self.health) || flag(&self.ping)
    }

    pub fn wants_dry_run(&self) -> bool {
        flag(&self.dry_run)
    }
}

/// Base64 image payload staged on the engine under `name`.
#[derive(Debug, Clone, Deserialize)]
pub struct InputImage {
    pub name: String,
    pub image: String,
}

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Health check or dry run passed.
    Ok,
    /// Job finished and produced artifacts.
    Success,
    /// Job finished but no artifacts could be located.
    SuccessNoOutputs,
    Error,
    Timeout,
}

impl JobStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Timeout)
    }
}

/// The one result shape every job returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,

    /// Engine-assigned id of the submitted job, when submission happened.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation_id: Option<String>,

    /// Workflow label, reported by dry runs.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub workflow: Option<String>,

    /// Engine readiness, reported by dry runs.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub engine_ready: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub artifacts: Vec<SerializedArtifact>,
}

impl ResultEnvelope {
    /// Bare `ok` for health checks.
    pub fn ok() -> Self {
        Self {
            status: JobStatus::Ok,
            error: None,
            correlation_id: None,
            workflow: None,
            engine_ready: None,
            artifacts: Vec::new(),
        }
    }

    /// Dry-run report: the workflow validated, plus an engine readiness flag.
    pub fn dry_run(workflow: String, engine_ready: bool) -> Self {
        Self {
            workflow: Some(workflow),
            engine_ready: Some(engine_ready),
            ..Self::ok()
        }
    }

    /// Completed job. Empty artifact lists downgrade to `success_no_outputs`.
    pub fn success(correlation_id: String, artifacts: Vec<SerializedArtifact>) -> Self {
        let status = if artifacts.is_empty() {
            JobStatus::SuccessNoOutputs
        } else {
            JobStatus::Success
        };
        Self {
            status,
            error: None,
            correlation_id: Some(correlation_id),
            workflow: None,
            engine_ready: None,
            artifacts,
        }
    }

    /// Failed job. Deadline errors map to `timeout`, everything else to `error`.
    pub fn failure(error: &FerryError, correlation_id: Option<String>) -> Self {
        let status = match error {
            FerryError::DeadlineExceeded { .. } => JobStatus::Timeout,
            _ => JobStatus::Error,
        };
        Self {
            status,
            error: Some(error.to_string()),
            correlation_id,
            workflow: None,
            engine_ready: None,
            artifacts: Vec::new(),
        }
    }
}
