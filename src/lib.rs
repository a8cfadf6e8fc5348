//! Ferry - synchronous job adapter for graph execution engines
//!
//! ## Architecture
//!
//! ```text
//! request JSON
//!      │
//!      ▼
//!  handler ──▶ workflow (normalize) ──▶ engine (submit, monitor)
//!      │                                        │
//!      ▼                                        ▼
//!  envelope ◀── artifact (resolve, package) ◀── completion
//!                      │
//!                  notify (lifecycle webhooks, best-effort)
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`handler`] | One-invocation orchestration, the only entry point |
//! | [`workflow`] | Workflow sourcing and normalization into the canonical graph |
//! | [`engine`] | Engine HTTP client and the two completion monitors |
//! | [`artifact`] | Artifact discovery, serialization, safe cleanup |
//! | [`notify`] | Best-effort lifecycle webhooks |
//! | [`envelope`] | Request parsing and the unified result envelope |
//! | [`config`] | `FERRY_*` environment configuration |
//! | [`error`] | Error types with codes and fix suggestions |
//! | [`util`] | Timing constants, loose truthiness |

// ═══════════════════════════════════════════════════════════════
// DOMAIN - workflow model and envelopes
// ═══════════════════════════════════════════════════════════════
pub mod envelope;
pub mod workflow;

// ═══════════════════════════════════════════════════════════════
// EXECUTION - engine protocol and orchestration
// ═══════════════════════════════════════════════════════════════
pub mod artifact;
pub mod engine;
pub mod handler;
pub mod notify;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - configuration, errors, utilities
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

pub use config::{Config, MonitorMode, ReturnMode};
pub use envelope::{JobRequest, JobStatus, ResultEnvelope};
pub use error::{FerryError, Result};
pub use handler::handle;
