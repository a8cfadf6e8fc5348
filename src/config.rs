//! Ferry Configuration Module
//!
//! All settings come from `FERRY_*` environment variables, with defaults
//! aimed at a local engine on `127.0.0.1:8188`. The CLI loads `.env` files
//! via dotenvy before this module reads the environment.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`FERRY_*`)
//! 2. Defaults

use std::env;
use std::str::FromStr;
use std::time::Duration;

use camino::Utf8PathBuf;

use crate::error::{FerryError, Result};
use crate::util::is_truthy_str;

/// How finished artifacts are returned to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnMode {
    /// Base64-encode artifact bytes into the result envelope.
    #[default]
    Inline,
    /// Upload artifacts to `FERRY_UPLOAD_URL` and return their URLs.
    Reference,
}

impl FromStr for ReturnMode {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "reference" => Ok(Self::Reference),
            other => Err(FerryError::Config {
                reason: format!("FERRY_RETURN_MODE: expected 'inline' or 'reference', got '{other}'"),
            }),
        }
    }
}

/// How job completion is detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonitorMode {
    /// Follow the engine's WebSocket event stream.
    #[default]
    Stream,
    /// Poll the engine's history endpoint.
    Poll,
}

impl FromStr for MonitorMode {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stream" => Ok(Self::Stream),
            "poll" => Ok(Self::Poll),
            other => Err(FerryError::Config {
                reason: format!("FERRY_MONITOR_MODE: expected 'stream' or 'poll', got '{other}'"),
            }),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Engine host (`FERRY_ENGINE_HOST`)
    pub engine_host: String,
    /// Engine port (`FERRY_ENGINE_PORT`)
    pub engine_port: u16,
    /// Directory searched for named workflows (`FERRY_WORKFLOWS_DIR`)
    pub workflows_dir: Utf8PathBuf,
    /// Directory the engine writes artifacts to (`FERRY_OUTPUT_DIR`)
    pub output_dir: Utf8PathBuf,
    /// Artifact return mode (`FERRY_RETURN_MODE`)
    pub return_mode: ReturnMode,
    /// Upload target for reference mode (`FERRY_UPLOAD_URL`)
    pub upload_url: Option<String>,
    /// Completion detection mode (`FERRY_MONITOR_MODE`)
    pub monitor_mode: MonitorMode,
    /// Hard deadline for a single job (`FERRY_MAX_EXECUTION_SECS`)
    pub max_execution: Duration,
    /// Pause between history polls (`FERRY_POLL_INTERVAL_MS`)
    pub poll_interval: Duration,
    /// Pause before a stream reconnect attempt (`FERRY_RECONNECT_DELAY_MS`)
    pub reconnect_delay: Duration,
    /// Consecutive stream failures tolerated before giving up (`FERRY_MAX_RECONNECTS`)
    pub max_reconnects: u32,
    /// Budget for the pre-flight readiness probe (`FERRY_READY_TIMEOUT_SECS`)
    pub ready_timeout: Duration,
    /// Lifecycle webhook endpoint (`FERRY_OBSERVER_URL`)
    pub observer_url: Option<String>,
    /// Shared secret sent as `X-Webhook-Secret` (`FERRY_OBSERVER_SECRET`)
    pub observer_secret: Option<String>,
    /// Skip artifact cleanup after packaging (`FERRY_RETAIN_OUTPUTS`)
    pub retain_outputs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_host: "127.0.0.1".to_string(),
            engine_port: 8188,
            workflows_dir: Utf8PathBuf::from("./workflows"),
            output_dir: Utf8PathBuf::from("./output"),
            return_mode: ReturnMode::Inline,
            upload_url: None,
            monitor_mode: MonitorMode::Stream,
            max_execution: Duration::from_secs(1800),
            poll_interval: Duration::from_millis(1500),
            reconnect_delay: Duration::from_millis(3000),
            max_reconnects: 5,
            ready_timeout: Duration::from_secs(10),
            observer_url: None,
            observer_secret: None,
            retain_outputs: false,
        }
    }
}

fn invalid(var: &str, value: &str) -> FerryError {
    FerryError::Config {
        reason: format!("{var}: invalid value '{value}'"),
    }
}

impl Config {
    /// Build a config from the environment.
    ///
    /// Unset and empty variables keep their defaults. Malformed numeric
    /// values are a hard error rather than a silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("FERRY_ENGINE_HOST") {
            if !host.is_empty() {
                config.engine_host = host;
            }
        }

        if let Ok(port) = env::var("FERRY_ENGINE_PORT") {
            if !port.is_empty() {
                config.engine_port = port
                    .parse()
                    .map_err(|_| invalid("FERRY_ENGINE_PORT", &port))?;
            }
        }

        if let Ok(dir) = env::var("FERRY_WORKFLOWS_DIR") {
            if !dir.is_empty() {
                config.workflows_dir = Utf8PathBuf::from(dir);
            }
        }

        if let Ok(dir) = env::var("FERRY_OUTPUT_DIR") {
            if !dir.is_empty() {
                config.output_dir = Utf8PathBuf::from(dir);
            }
        }

        if let Ok(mode) = env::var("FERRY_RETURN_MODE") {
            if !mode.is_empty() {
                config.return_mode = mode.parse()?;
            }
        }

        if let Ok(url) = env::var("FERRY_UPLOAD_URL") {
            if !url.is_empty() {
                config.upload_url = Some(url);
            }
        }

        if let Ok(mode) = env::var("FERRY_MONITOR_MODE") {
            if !mode.is_empty() {
                config.monitor_mode = mode.parse()?;
            }
        }

        if let Ok(secs) = env::var("FERRY_MAX_EXECUTION_SECS") {
            if !secs.is_empty() {
                let parsed: u64 = secs
                    .parse()
                    .map_err(|_| invalid("FERRY_MAX_EXECUTION_SECS", &secs))?;
                config.max_execution = Duration::from_secs(parsed);
            }
        }

        if let Ok(ms) = env::var("FERRY_POLL_INTERVAL_MS") {
            if !ms.is_empty() {
                let parsed: u64 = ms
                    .parse()
                    .map_err(|_| invalid("FERRY_POLL_INTERVAL_MS", &ms))?;
                config.poll_interval = Duration::from_millis(parsed);
            }
        }

        if let Ok(ms) = env::var("FERRY_RECONNECT_DELAY_MS") {
            if !ms.is_empty() {
                let parsed: u64 = ms
                    .parse()
                    .map_err(|_| invalid("FERRY_RECONNECT_DELAY_MS", &ms))?;
                config.reconnect_delay = Duration::from_millis(parsed);
            }
        }

        if let Ok(count) = env::var("FERRY_MAX_RECONNECTS") {
            if !count.is_empty() {
                config.max_reconnects = count
                    .parse()
                    .map_err(|_| invalid("FERRY_MAX_RECONNECTS", &count))?;
            }
        }

        if let Ok(secs) = env::var("FERRY_READY_TIMEOUT_SECS") {
            if !secs.is_empty() {
                let parsed: u64 = secs
                    .parse()
                    .map_err(|_| invalid("FERRY_READY_TIMEOUT_SECS", &secs))?;
                config.ready_timeout = Duration::from_secs(parsed);
            }
        }

        if let Ok(url) = env::var("FERRY_OBSERVER_URL") {
            if !url.is_empty() {
                config.observer_url = Some(url);
            }
        }

        if let Ok(secret) = env::var("FERRY_OBSERVER_SECRET") {
            if !secret.is_empty() {
                config.observer_secret = Some(secret);
            }
        }

        if let Ok(flag) = env::var("FERRY_RETAIN_OUTPUTS") {
            if !flag.is_empty() {
                config.retain_outputs = is_truthy_str(&flag);
            }
        }

        Ok(config)
    }

    /// Base URL for the engine's HTTP API
    pub fn http_base(&self) -> String {
        format!("http://{}:{}", self.engine_host, self.engine_port)
    }

    /// WebSocket endpoint for the engine's event stream
    pub fn ws_endpoint(&self) -> String {
        format!("ws://{}:{}/ws", self.engine_host, self.engine_port)
    }
}
