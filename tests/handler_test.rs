//! End-to-end handler tests.
//!
//! Jobs run against a scripted engine double (HTTP plus WebSocket) or a
//! wiremock server for the HTTP-only paths, with artifacts living in a
//! real temporary output directory. Every test asserts on the one
//! envelope shape callers actually receive.

mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use camino::Utf8PathBuf;
use ferry::artifact::{ArtifactKind, Encoding};
use ferry::{handle, Config, JobStatus, MonitorMode};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ScriptedEngine, WsScript};

// =============================================================================
// HELPERS
// =============================================================================

fn utf8(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("tempdir path is utf-8")
}

/// Config pointed at the scripted engine, with test-sized timeouts.
fn engine_config(port: u16, output: &TempDir) -> Config {
    Config {
        engine_port: port,
        output_dir: utf8(output),
        max_execution: Duration::from_secs(5),
        poll_interval: Duration::from_millis(25),
        reconnect_delay: Duration::from_millis(20),
        max_reconnects: 2,
        ready_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

fn keyed_workflow() -> Value {
    json!({"7": {"class_type": "SaveImage", "inputs": {"filename_prefix": "ferry"}}})
}

fn executed_frame(prompt_id: &str, filename: &str) -> Value {
    json!({
        "type": "executed",
        "data": {
            "node": "7",
            "prompt_id": prompt_id,
            "output": {
                "images": [{"filename": filename, "subfolder": "", "type": "output"}]
            }
        }
    })
}

fn finished_frame() -> Value {
    json!({"type": "status", "data": {"status": "finished"}})
}

async fn mock_system_stats(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/system_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"system": {}})))
        .mount(server)
        .await;
}

// =============================================================================
// FAST PATHS
// =============================================================================

#[tokio::test]
async fn test_health_checks_short_circuit_without_engine_traffic() {
    // Arrange: no engine anywhere; the config points at a dead port.
    let config = Config::default();

    // Act
    let started = Instant::now();
    let envelope = handle(json!({"input": {"ping": true}}), &config).await;

    // Assert
    assert_eq!(serde_json::to_value(&envelope).unwrap(), json!({"status": "ok"}));
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_string_health_flags_are_honored() {
    let envelope = handle(json!({"input": {"health": "1"}}), &Config::default()).await;
    assert_eq!(envelope.status, JobStatus::Ok);
}

#[tokio::test]
async fn test_missing_workflow_is_a_clean_error() {
    // Act
    let envelope = handle(json!({"input": {}}), &Config::default()).await;

    // Assert
    assert_eq!(envelope.status, JobStatus::Error);
    assert!(envelope.correlation_id.is_none());
    assert!(envelope.error.unwrap().contains("FERRY-001"));
}

#[tokio::test]
async fn test_malformed_requests_fail_without_panicking() {
    // Arrange: `images` must be a list.
    let request = json!({"input": {"workflow": {}, "images": "nope"}});

    // Act
    let envelope = handle(request, &Config::default()).await;

    // Assert
    assert_eq!(envelope.status, JobStatus::Error);
    assert!(envelope.error.unwrap().contains("FERRY-002"));
}

// =============================================================================
// DRY RUNS
// =============================================================================

#[tokio::test]
async fn test_dry_run_validates_without_submitting() {
    // Arrange
    let workflows = TempDir::new().unwrap();
    std::fs::write(
        workflows.path().join("t2v.json"),
        keyed_workflow().to_string(),
    )
    .unwrap();

    let engine = MockServer::start().await;
    mock_system_stats(&engine).await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&engine)
        .await;

    let config = Config {
        engine_port: engine.address().port(),
        workflows_dir: utf8(&workflows),
        ..Config::default()
    };

    // Act
    let envelope = handle(
        json!({"input": {"workflow": "t2v.json", "dry_run": true}}),
        &config,
    )
    .await;

    // Assert
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"status": "ok", "workflow": "t2v.json", "engine_ready": true})
    );
}

#[tokio::test]
async fn test_dry_run_reports_an_unready_engine() {
    // Arrange: the engine answers nothing useful, so the probe burns its
    // (short) budget and reports not-ready. Validation still passes.
    let engine = MockServer::start().await;

    let config = Config {
        engine_port: engine.address().port(),
        ready_timeout: Duration::from_millis(300),
        ..Config::default()
    };

    // Act
    let envelope = handle(
        json!({"input": {"workflow": keyed_workflow(), "dry_run": true}}),
        &config,
    )
    .await;

    // Assert
    assert_eq!(envelope.status, JobStatus::Ok);
    assert_eq!(envelope.engine_ready, Some(false));
    assert_eq!(envelope.workflow.as_deref(), Some("(inline)"));
}

#[tokio::test]
async fn test_dry_run_reports_missing_workflow_files_with_the_path() {
    // Arrange: empty workflows dir, engine never contacted.
    let workflows = TempDir::new().unwrap();
    let config = Config {
        workflows_dir: utf8(&workflows),
        ..Config::default()
    };

    // Act
    let envelope = handle(
        json!({"input": {"workflow": "absent.json", "dry_run": true}}),
        &config,
    )
    .await;

    // Assert: the error names the path that was actually checked.
    assert_eq!(envelope.status, JobStatus::Error);
    let error = envelope.error.unwrap();
    assert!(error.contains("FERRY-010"), "{error}");
    assert!(error.contains(utf8(&workflows).as_str()), "{error}");
    assert!(error.contains("absent.json"), "{error}");
}

// =============================================================================
// STREAM-MONITORED JOBS
// =============================================================================

#[tokio::test]
async fn test_stream_job_returns_inline_artifacts_and_cleans_up() {
    // Arrange
    let output = TempDir::new().unwrap();
    std::fs::write(output.path().join("ferry_0001.png"), b"png bytes here").unwrap();

    let engine = ScriptedEngine::start(
        "job-abc",
        vec![WsScript::play(vec![
            executed_frame("job-abc", "ferry_0001.png"),
            finished_frame(),
        ])],
    )
    .await;
    let config = engine_config(engine.port, &output);

    // Act
    let envelope = handle(
        json!({"input": {"workflow": keyed_workflow(), "client_id": "sess-1"}}),
        &config,
    )
    .await;

    // Assert
    assert_eq!(envelope.status, JobStatus::Success);
    assert_eq!(envelope.correlation_id.as_deref(), Some("job-abc"));
    assert_eq!(envelope.artifacts.len(), 1);

    let artifact = &envelope.artifacts[0];
    assert_eq!(artifact.filename, "ferry_0001.png");
    assert_eq!(artifact.kind, ArtifactKind::Image);
    assert_eq!(artifact.encoding, Encoding::Inline);
    assert_eq!(artifact.payload, STANDARD.encode(b"png bytes here"));

    // One submission, and the packaged file is gone from the shared dir.
    assert_eq!(engine.submissions.load(Ordering::SeqCst), 1);
    assert!(!output.path().join("ferry_0001.png").exists());
}

#[tokio::test]
async fn test_finished_job_without_outputs_downgrades_the_status() {
    // Arrange: the engine reports completion but no executed payloads.
    // A stale file from an earlier run sits in the shared output dir.
    let output = TempDir::new().unwrap();
    std::fs::write(output.path().join("stale.png"), b"older run").unwrap();
    let engine =
        ScriptedEngine::start("job-empty", vec![WsScript::play(vec![finished_frame()])]).await;
    let config = engine_config(engine.port, &output);

    // Act
    let envelope = handle(json!({"input": {"workflow": keyed_workflow()}}), &config).await;

    // Assert: empty result, and the stale file was neither packaged
    // nor cleaned up.
    assert_eq!(envelope.status, JobStatus::SuccessNoOutputs);
    assert!(envelope.artifacts.is_empty());
    assert!(output.path().join("stale.png").exists());
}

#[tokio::test]
async fn test_execution_errors_produce_an_error_envelope_and_webhooks() {
    // Arrange
    let output = TempDir::new().unwrap();
    let observer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "action": "queued",
            "correlation_id": "job-err",
            "workflow": "(inline)"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&observer)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "action": "error",
            "correlation_id": "job-err",
            "code": "FERRY-032"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&observer)
        .await;

    let engine = ScriptedEngine::start(
        "job-err",
        vec![WsScript::play(vec![json!({
            "type": "execution_error",
            "data": {
                "prompt_id": "job-err",
                "node_type": "KSampler",
                "exception_message": "CUDA out of memory"
            }
        })])],
    )
    .await;

    let mut config = engine_config(engine.port, &output);
    config.observer_url = Some(format!("{}/hook", observer.uri()));

    // Act
    let envelope = handle(json!({"input": {"workflow": keyed_workflow()}}), &config).await;

    // Assert: error envelope with the correlation id, no artifacts.
    assert_eq!(envelope.status, JobStatus::Error);
    assert_eq!(envelope.correlation_id.as_deref(), Some("job-err"));
    assert!(envelope.artifacts.is_empty());
    let error = envelope.error.unwrap();
    assert!(error.contains("FERRY-032"), "{error}");
    assert!(error.contains("CUDA out of memory"), "{error}");
    // Webhook expectations verify when `observer` drops.
}

// =============================================================================
// POLL-MONITORED JOBS
// =============================================================================

#[tokio::test]
async fn test_poll_job_stages_images_and_returns_artifacts() {
    // Arrange
    let output = TempDir::new().unwrap();
    std::fs::write(output.path().join("gen.png"), b"poll bytes").unwrap();

    let engine = MockServer::start().await;
    mock_system_stats(&engine).await;
    Mock::given(method("POST"))
        .and(path("/upload/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "mask.png"})))
        .expect(1)
        .mount(&engine)
        .await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .and(body_partial_json(json!({
            "client_id": "sess-9",
            "prompt": {"7": {"class_type": "SaveImage"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prompt_id": "poll-1"})))
        .expect(1)
        .mount(&engine)
        .await;
    Mock::given(method("GET"))
        .and(path("/history/poll-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "poll-1": {
                "status": {"status_str": "success", "completed": true},
                "outputs": {
                    "7": {"images": [{"filename": "gen.png", "subfolder": "", "type": "output"}]}
                }
            }
        })))
        .mount(&engine)
        .await;

    let observer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"action": "queued", "correlation_id": "poll-1"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&observer)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "action": "complete",
            "correlation_id": "poll-1",
            "artifacts": 1
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&observer)
        .await;

    let config = Config {
        engine_port: engine.address().port(),
        output_dir: utf8(&output),
        monitor_mode: MonitorMode::Poll,
        poll_interval: Duration::from_millis(25),
        max_execution: Duration::from_secs(5),
        observer_url: Some(observer.uri()),
        ..Config::default()
    };

    let request = json!({"input": {
        "workflow": keyed_workflow(),
        "client_id": "sess-9",
        "images": [{"name": "mask.png", "image": STANDARD.encode(b"mask bytes")}]
    }});

    // Act
    let envelope = handle(request, &config).await;

    // Assert
    assert_eq!(envelope.status, JobStatus::Success);
    assert_eq!(envelope.artifacts.len(), 1);
    assert_eq!(envelope.artifacts[0].filename, "gen.png");
    assert_eq!(envelope.artifacts[0].payload, STANDARD.encode(b"poll bytes"));
    assert!(!output.path().join("gen.png").exists());
}

// =============================================================================
// SUBMISSION FAILURES
// =============================================================================

#[tokio::test]
async fn test_rejected_submissions_preserve_the_engine_body() {
    // Arrange
    let engine = MockServer::start().await;
    mock_system_stats(&engine).await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string("node 7: missing required input 'images'"),
        )
        .mount(&engine)
        .await;

    let config = Config {
        engine_port: engine.address().port(),
        ..Config::default()
    };

    // Act
    let envelope = handle(json!({"input": {"workflow": keyed_workflow()}}), &config).await;

    // Assert: the engine's own words survive into the envelope.
    assert_eq!(envelope.status, JobStatus::Error);
    assert!(envelope.correlation_id.is_none());
    let error = envelope.error.unwrap();
    assert!(error.contains("FERRY-020"), "{error}");
    assert!(error.contains("status 400"), "{error}");
    assert!(error.contains("missing required input"), "{error}");
}

#[tokio::test]
async fn test_accepted_submissions_without_an_id_fail() {
    // Arrange
    let engine = MockServer::start().await;
    mock_system_stats(&engine).await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&engine)
        .await;

    let config = Config {
        engine_port: engine.address().port(),
        ..Config::default()
    };

    // Act
    let envelope = handle(json!({"input": {"workflow": keyed_workflow()}}), &config).await;

    // Assert
    assert_eq!(envelope.status, JobStatus::Error);
    assert!(envelope.error.unwrap().contains("FERRY-021"));
}

#[tokio::test]
async fn test_undecodable_image_payloads_fail_before_upload() {
    // Arrange
    let engine = MockServer::start().await;
    mock_system_stats(&engine).await;
    Mock::given(method("POST"))
        .and(path("/upload/image"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&engine)
        .await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&engine)
        .await;

    let config = Config {
        engine_port: engine.address().port(),
        ..Config::default()
    };

    let request = json!({"input": {
        "workflow": keyed_workflow(),
        "images": [{"name": "mask.png", "image": "not base64!!!"}]
    }});

    // Act
    let envelope = handle(request, &config).await;

    // Assert
    assert_eq!(envelope.status, JobStatus::Error);
    let error = envelope.error.unwrap();
    assert!(error.contains("FERRY-022"), "{error}");
    assert!(error.contains("mask.png"), "{error}");
}
