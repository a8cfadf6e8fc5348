//! Shared test doubles for the engine.
//!
//! wiremock covers every plain-HTTP surface, but it cannot upgrade a
//! connection to WebSocket, so stream-monitor tests need a hand-rolled
//! engine stub. [`ScriptedEngine`] serves the handful of HTTP endpoints
//! the pipeline touches and plays a scripted frame sequence to each
//! WebSocket connection, which is enough to walk the monitor through
//! every terminal state.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// What one WebSocket connection receives.
pub struct WsScript {
    pub frames: Vec<Value>,
    /// Close the socket after the last frame (simulates a dropped stream).
    /// When false the connection is held open silently.
    pub drop_after: bool,
}

impl WsScript {
    pub fn play(frames: Vec<Value>) -> Self {
        Self {
            frames,
            drop_after: false,
        }
    }

    pub fn play_then_drop(frames: Vec<Value>) -> Self {
        Self {
            frames,
            drop_after: true,
        }
    }
}

/// Minimal engine double: HTTP endpoints plus a scripted event stream.
///
/// Each incoming WebSocket connection consumes the next script in order;
/// once the scripts run out, connections are held open without frames.
pub struct ScriptedEngine {
    pub port: u16,
    pub submissions: Arc<AtomicU32>,
    pub ws_connections: Arc<AtomicU32>,
}

impl ScriptedEngine {
    pub async fn start(prompt_id: &str, scripts: Vec<WsScript>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let submissions = Arc::new(AtomicU32::new(0));
        let ws_connections = Arc::new(AtomicU32::new(0));
        let scripts = Arc::new(Mutex::new(VecDeque::from(scripts)));

        let prompt_id = prompt_id.to_string();
        let submission_counter = submissions.clone();
        let connection_counter = ws_connections.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let prompt_id = prompt_id.clone();
                let submissions = submission_counter.clone();
                let connections = connection_counter.clone();
                let scripts = scripts.clone();
                tokio::spawn(async move {
                    serve_connection(stream, &prompt_id, &submissions, &connections, &scripts)
                        .await;
                });
            }
        });

        Self {
            port,
            submissions,
            ws_connections,
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    prompt_id: &str,
    submissions: &AtomicU32,
    connections: &AtomicU32,
    scripts: &Mutex<VecDeque<WsScript>>,
) {
    // Peek the request line without consuming it: WebSocket upgrades must
    // reach tungstenite with the handshake bytes still in the stream.
    let mut peek = [0u8; 256];
    let n = stream.peek(&mut peek).await.unwrap_or(0);
    let head = String::from_utf8_lossy(&peek[..n]).into_owned();

    if head.starts_with("GET /ws") {
        serve_stream(stream, connections, scripts).await;
    } else {
        serve_http(stream, prompt_id, submissions).await;
    }
}

async fn serve_stream(
    stream: TcpStream,
    connections: &AtomicU32,
    scripts: &Mutex<VecDeque<WsScript>>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    connections.fetch_add(1, Ordering::SeqCst);

    let script = scripts.lock().unwrap().pop_front();
    if let Some(script) = script {
        for frame in &script.frames {
            if ws.send(Message::Text(frame.to_string())).await.is_err() {
                return;
            }
        }
        if script.drop_after {
            return;
        }
    }

    // Hold the connection open until the client hangs up.
    while let Some(Ok(_)) = ws.next().await {}
}

async fn serve_http(mut stream: TcpStream, prompt_id: &str, submissions: &AtomicU32) {
    let request = read_request(&mut stream).await;
    let request_line = request.lines().next().unwrap_or_default();

    let (status, body) = if request_line.starts_with("GET /system_stats") {
        (200, json!({"system": {"os": "test"}}))
    } else if request_line.starts_with("POST /prompt") {
        submissions.fetch_add(1, Ordering::SeqCst);
        (200, json!({"prompt_id": prompt_id}))
    } else if request_line.starts_with("POST /upload/image") {
        (200, json!({"name": "uploaded"}))
    } else if request_line.starts_with("GET /history/") {
        (200, json!({}))
    } else {
        (404, json!({"error": "not found"}))
    };

    respond_json(&mut stream, status, &body).await;
}

/// Read one HTTP request: headers plus a content-length body.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 2048];

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let expected = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + expected {
            break;
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

async fn respond_json(stream: &mut TcpStream, status: u16, body: &Value) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Error",
    };
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
