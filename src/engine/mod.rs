//! Engine-facing protocol: HTTP submission and the two completion monitors.

pub mod client;
pub mod monitor;
pub mod poll;
pub mod stream;

pub use client::EngineClient;
pub use monitor::{monitor_for_mode, CompletionMonitor};
pub use poll::PollMonitor;
pub use stream::StreamMonitor;

use serde_json::Value;

/// Everything needed to track one submitted job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// Engine-assigned id for the submission.
    pub correlation_id: String,
    /// Session token the event stream is keyed on.
    pub session_token: String,
}

/// Output payload attributed to one graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    pub node: String,
    pub output: Value,
}

/// Terminal payload handed from a monitor to the artifact resolver.
///
/// Stream monitors fill `outputs` from `executed` events; the polling
/// monitor instead hands over the raw history record.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub outputs: Vec<NodeOutput>,
    pub history: Option<Value>,
}
