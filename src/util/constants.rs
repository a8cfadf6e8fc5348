//! Centralized constants for ferry runtime tuning
//!
//! All timeout and limit values in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Engine HTTP
// ═══════════════════════════════════════════════════════════════

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the job submission request
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single history fetch
pub const HISTORY_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a single readiness probe request
pub const READY_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Pause between readiness probe attempts
pub const READY_PROBE_PAUSE: Duration = Duration::from_millis(500);

/// Timeout for artifact and input-image uploads
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════════
// Event Stream
// ═══════════════════════════════════════════════════════════════

/// How long one stream read may block before the monitor re-checks
/// its deadline. A lapse is a liveness tick, not a failure.
pub const STREAM_RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════
// Observer Webhooks
// ═══════════════════════════════════════════════════════════════

/// Timeout for one lifecycle webhook delivery
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════
// Artifact Resolution
// ═══════════════════════════════════════════════════════════════

/// Upper bound on files picked up by the output-directory fallback scan
pub const MAX_SCANNED_ARTIFACTS: usize = 8;

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
