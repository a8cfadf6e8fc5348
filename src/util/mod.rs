//! Shared utilities: runtime constants and loose-flag parsing.

pub mod constants;

pub use constants::*;

use serde_json::Value;

/// Truthiness for loosely-typed request flags.
///
/// Callers send `true`, `1`, `"true"`, `"yes"`, `"on"` (any case) and
/// expect all of them to count. Everything else, including `1.0` and
/// arbitrary non-empty strings, is false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => is_truthy_str(s),
        _ => false,
    }
}

/// String form of [`is_truthy`], shared with env-var parsing.
pub fn is_truthy_str(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
