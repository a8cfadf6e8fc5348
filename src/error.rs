//! Ferry Error Types with Error Codes
//!
//! Error code ranges:
//! - FERRY-000-009: Request envelope errors
//! - FERRY-010-019: Workflow/graph errors
//! - FERRY-020-029: Submission errors
//! - FERRY-030-039: Monitoring errors
//! - FERRY-040-049: Artifact errors
//! - FERRY-050-059: Config errors
//! - FERRY-090-099: IO/JSON errors
//!
//! Uses miette for fancy error display in the CLI.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FerryError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
#[diagnostic(url(docsrs))]
pub enum FerryError {
    // ═══════════════════════════════════════════
    // REQUEST ENVELOPE ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[FERRY-001] Missing 'workflow' parameter")]
    #[diagnostic(
        code(ferry::missing_workflow),
        help("Include a 'workflow' field in the request input")
    )]
    MissingWorkflow,

    #[error("[FERRY-002] Invalid request input: {reason}")]
    InvalidInput { reason: String },

    // ═══════════════════════════════════════════
    // WORKFLOW/GRAPH ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[FERRY-010] Workflow not found: {path}")]
    #[diagnostic(code(ferry::workflow_not_found), help("Check the file path exists"))]
    WorkflowNotFound { path: String },

    #[error("[FERRY-011] Failed to parse workflow: {details}")]
    #[diagnostic(
        code(ferry::malformed_workflow),
        help("Workflows must be JSON: a node map, a node list, or a wrapper object")
    )]
    MalformedWorkflow { details: String },

    #[error("[FERRY-012] Invalid node '{node}': {reason}")]
    NodeSchema { node: String, reason: String },

    #[error("[FERRY-013] Workflow graph has no nodes")]
    EmptyGraph,

    // ═══════════════════════════════════════════
    // SUBMISSION ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[FERRY-020] Submission rejected by engine (status {status}): {body}")]
    #[diagnostic(
        code(ferry::submission_rejected),
        help("Check the engine logs for the rejected prompt")
    )]
    Submission { status: u16, body: String },

    #[error("[FERRY-021] Engine accepted the submission but returned no correlation id")]
    MissingCorrelationId,

    #[error("[FERRY-022] Failed to upload input image '{name}': {detail}")]
    ImageUpload { name: String, detail: String },

    // ═══════════════════════════════════════════
    // MONITORING ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[FERRY-030] Engine transport error: {detail}")]
    Transport { detail: String },

    #[error("[FERRY-031] Event stream reconnect attempts exhausted after {attempts} tries")]
    #[diagnostic(
        code(ferry::reconnects_exhausted),
        help("Raise FERRY_MAX_RECONNECTS or check engine stability")
    )]
    ReconnectsExhausted { attempts: u32 },

    #[error("[FERRY-032] Engine reported an execution error: {detail}")]
    EngineExecution { detail: String },

    #[error("[FERRY-033] Execution deadline exceeded ({timeout_secs}s)")]
    #[diagnostic(
        code(ferry::deadline_exceeded),
        help("Raise FERRY_MAX_EXECUTION_SECS or simplify the workflow")
    )]
    DeadlineExceeded { timeout_secs: u64 },

    // ═══════════════════════════════════════════
    // ARTIFACT ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[FERRY-040] Failed to read artifact '{path}': {detail}")]
    #[diagnostic(
        code(ferry::artifact_read),
        help("Check FERRY_OUTPUT_DIR matches the engine's output directory")
    )]
    ArtifactRead { path: String, detail: String },

    #[error("[FERRY-041] Failed to upload artifact '{filename}': {detail}")]
    ArtifactUpload { filename: String, detail: String },

    // ═══════════════════════════════════════════
    // CONFIG ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[FERRY-050] Config error: {reason}")]
    #[diagnostic(code(ferry::config), help("Check the FERRY_* environment variables"))]
    Config { reason: String },

    // ═══════════════════════════════════════════
    // IO/JSON ERRORS (090-099)
    // ═══════════════════════════════════════════
    #[error("[FERRY-090] IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[FERRY-091] JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FerryError {
    /// Get the error code (e.g., "FERRY-001")
    pub fn code(&self) -> &'static str {
        match self {
            // Request envelope errors
            Self::MissingWorkflow => "FERRY-001",
            Self::InvalidInput { .. } => "FERRY-002",
            // Workflow/graph errors
            Self::WorkflowNotFound { .. } => "FERRY-010",
            Self::MalformedWorkflow { .. } => "FERRY-011",
            Self::NodeSchema { .. } => "FERRY-012",
            Self::EmptyGraph => "FERRY-013",
            // Submission errors
            Self::Submission { .. } => "FERRY-020",
            Self::MissingCorrelationId => "FERRY-021",
            Self::ImageUpload { .. } => "FERRY-022",
            // Monitoring errors
            Self::Transport { .. } => "FERRY-030",
            Self::ReconnectsExhausted { .. } => "FERRY-031",
            Self::EngineExecution { .. } => "FERRY-032",
            Self::DeadlineExceeded { .. } => "FERRY-033",
            // Artifact errors
            Self::ArtifactRead { .. } => "FERRY-040",
            Self::ArtifactUpload { .. } => "FERRY-041",
            // Config errors
            Self::Config { .. } => "FERRY-050",
            // IO/JSON errors
            Self::Io(_) => "FERRY-090",
            Self::Json(_) => "FERRY-091",
        }
    }

    /// Check if the error is transient (a retry with the same request may succeed)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. }
            | Self::ReconnectsExhausted { .. }
            | Self::DeadlineExceeded { .. } => true,
            Self::Submission { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl FixSuggestion for FerryError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FerryError::MissingWorkflow => {
                Some("Include a 'workflow' field in the request input")
            }
            FerryError::InvalidInput { .. } => {
                Some("Check the request envelope matches the expected input shape")
            }
            FerryError::WorkflowNotFound { .. } => {
                Some("Check the file exists under FERRY_WORKFLOWS_DIR")
            }
            FerryError::MalformedWorkflow { .. } => {
                Some("Check the workflow is valid JSON in API (node map) format")
            }
            FerryError::NodeSchema { .. } => {
                Some("Each node needs a 'class_type' string and an object 'inputs'")
            }
            FerryError::EmptyGraph => Some("Add at least one node to the workflow"),
            FerryError::Submission { .. } => {
                Some("Check the engine logs for why the prompt was rejected")
            }
            FerryError::MissingCorrelationId => {
                Some("Check the engine version: submissions must return a prompt id")
            }
            FerryError::ImageUpload { .. } => {
                Some("Check the image payload is valid base64 and the engine is reachable")
            }
            FerryError::Transport { .. } => {
                Some("Check the engine is reachable at FERRY_ENGINE_HOST:FERRY_ENGINE_PORT")
            }
            FerryError::ReconnectsExhausted { .. } => {
                Some("Raise FERRY_MAX_RECONNECTS or check engine stability")
            }
            FerryError::EngineExecution { .. } => {
                Some("Check the engine logs for the failing node")
            }
            FerryError::DeadlineExceeded { .. } => {
                Some("Raise FERRY_MAX_EXECUTION_SECS or simplify the workflow")
            }
            FerryError::ArtifactRead { .. } => {
                Some("Check FERRY_OUTPUT_DIR matches the engine's output directory")
            }
            FerryError::ArtifactUpload { .. } => {
                Some("Check FERRY_UPLOAD_URL is reachable and accepts PUT")
            }
            FerryError::Config { .. } => Some("Check the FERRY_* environment variables"),
            FerryError::Io(_) => Some("Check file path and permissions"),
            FerryError::Json(_) => Some("Check JSON syntax"),
        }
    }
}
