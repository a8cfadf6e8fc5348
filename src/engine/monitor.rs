//! Completion monitoring interface.
//!
//! Two strategies detect job completion: following the engine's WebSocket
//! event stream, or polling its history endpoint. Both sit behind
//! [`CompletionMonitor`] so the handler's orchestration does not care
//! which one the deployment picked.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::{Config, MonitorMode};
use crate::engine::poll::PollMonitor;
use crate::engine::stream::StreamMonitor;
use crate::engine::{Completion, JobHandle};
use crate::error::{FerryError, Result};

#[async_trait]
pub trait CompletionMonitor: Send + Sync {
    /// Block until the job reaches a terminal state or the deadline hits.
    async fn wait(&self, job: &JobHandle) -> Result<Completion>;
}

/// Select the monitor implementation for the configured mode.
pub fn monitor_for_mode(config: &Config) -> Result<Box<dyn CompletionMonitor>> {
    match config.monitor_mode {
        MonitorMode::Stream => Ok(Box::new(StreamMonitor::new(config))),
        MonitorMode::Poll => Ok(Box::new(PollMonitor::new(config)?)),
    }
}

/// Time left until `deadline`, or the terminal timeout error.
///
/// Monitors call this at the top of every loop iteration so a job can
/// never outlive its budget, whatever state the connection is in.
pub(crate) fn remaining_or_deadline(deadline: Instant, budget: Duration) -> Result<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(FerryError::DeadlineExceeded {
            timeout_secs: budget.as_secs(),
        });
    }
    Ok(remaining)
}
