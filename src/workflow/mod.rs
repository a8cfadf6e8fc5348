//! Workflow sourcing and the normalized graph model.
//!
//! A request's `workflow` field can be an inline graph, a raw JSON string,
//! or the name of a file under the workflows directory. All three funnel
//! through [`WorkflowSource`] into one JSON value, which [`normalize`]
//! turns into a canonical [`Graph`].

pub mod normalize;

pub use normalize::normalize;

use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FerryError, Result};

/// Where a workflow came from.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowSource {
    /// Graph passed directly in the request.
    Inline(Value),
    /// JSON text passed in the request.
    Raw(String),
    /// File name resolved against the workflows directory.
    Named(String),
}

impl WorkflowSource {
    /// Classify the request's `workflow` field.
    ///
    /// Strings that look like JSON (after trimming, they open with `{` or
    /// `[`) are treated as raw payloads rather than file names.
    pub fn from_request(value: &Value) -> Result<Self> {
        match value {
            Value::Object(_) | Value::Array(_) => Ok(Self::Inline(value.clone())),
            Value::String(s) => {
                let trimmed = s.trim_start();
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    Ok(Self::Raw(s.clone()))
                } else {
                    Ok(Self::Named(s.clone()))
                }
            }
            other => Err(FerryError::MalformedWorkflow {
                details: format!("'workflow' must be an object, array, or string, got {}", json_type(other)),
            }),
        }
    }

    /// Human-readable label for logs and dry-run reports.
    pub fn label(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Raw(_) => "(raw)".to_string(),
            Self::Inline(_) => "(inline)".to_string(),
        }
    }

    /// Produce the workflow JSON, reading from disk for named sources.
    pub async fn load(&self, workflows_dir: &Utf8Path) -> Result<Value> {
        match self {
            Self::Inline(value) => Ok(value.clone()),
            Self::Raw(text) => serde_json::from_str(text).map_err(|e| {
                FerryError::MalformedWorkflow {
                    details: e.to_string(),
                }
            }),
            Self::Named(name) => {
                let path = resolve_workflow_path(name, workflows_dir);
                if !path.is_file() {
                    return Err(FerryError::WorkflowNotFound {
                        path: path.into_string(),
                    });
                }
                let text = tokio::fs::read_to_string(&path).await?;
                serde_json::from_str(&text).map_err(|e| FerryError::MalformedWorkflow {
                    details: format!("{name}: {e}"),
                })
            }
        }
    }
}

/// Resolve a workflow file reference. Absolute paths pass through untouched.
pub fn resolve_workflow_path(name: &str, workflows_dir: &Utf8Path) -> Utf8PathBuf {
    let candidate = Utf8Path::new(name);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        workflows_dir.join(candidate)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One node of a normalized graph, in the engine's API format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub class_type: String,

    #[serde(default = "empty_object")]
    pub inputs: Value,

    /// Fields the engine understands but this adapter does not inspect.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Node {
    pub fn new(class_type: impl Into<String>, inputs: Value) -> Self {
        Self {
            class_type: class_type.into(),
            inputs,
            extra: Map::new(),
        }
    }
}

/// Canonical workflow graph: node id to node, submission-ready.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Graph(pub FxHashMap<String, Node>);

impl Graph {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.0.get(id)
    }
}
