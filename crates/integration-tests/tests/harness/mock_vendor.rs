//! Mock vendor backends for integration tests
//!
//! One axum app speaks four wire protocols under separate path prefixes:
//! OpenAI-compatible chat completions, Anthropic messages, Gemini
//! `generateContent` and Cohere v1 chat. Every protocol answers with the
//! same fragments so translations can be compared across vendors.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Text fragments every mock completion is made of
pub const FRAGMENTS: &[&str] = &["Hello", " from", " the", " mock", " vendor"];

/// Prompt tokens reported by every mock completion
pub const PROMPT_TOKENS: u64 = 9;

/// Completion tokens reported by every mock completion
pub const COMPLETION_TOKENS: u64 = 5;

/// The full completion text
pub fn full_text() -> String {
    FRAGMENTS.concat()
}

/// How the mock answers
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// Answer normally
    Complete,
    /// Stream the first `n` frames, then drop the connection
    BreakAfter(usize),
    /// Stream the first `n` frames, then go silent without closing
    StallAfter(usize),
    /// Reject every request with this HTTP status
    Reject(u16),
    /// Finish streams cleanly but never report usage
    OmitUsage,
}

/// Mock vendor server bound to a random local port
pub struct MockVendor {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    mode: Mode,
    request_count: AtomicU32,
    open_streams: AtomicUsize,
    last_body: Mutex<Option<Value>>,
    last_credential: Mutex<Option<String>>,
}

impl MockVendor {
    /// Start a mock that answers normally
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(Mode::Complete).await
    }

    /// Start a mock with the given behaviour
    pub async fn start_with(mode: Mode) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            mode,
            request_count: AtomicU32::new(0),
            open_streams: AtomicUsize::new(0),
            last_body: Mutex::new(None),
            last_credential: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(openai_chat))
            .route("/anthropic/v1/messages", routing::post(anthropic_messages))
            .route("/google/v1beta/models/{action}", routing::post(google_generate))
            .route("/cohere/v1/chat", routing::post(cohere_chat))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for OpenAI-compatible adapters
    pub fn openai_base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Base URL for the Anthropic adapter
    pub fn anthropic_base_url(&self) -> String {
        format!("http://{}/anthropic/v1", self.addr)
    }

    /// Base URL for the Gemini adapter
    pub fn google_base_url(&self) -> String {
        format!("http://{}/google/v1beta", self.addr)
    }

    /// Base URL for the Cohere adapter
    pub fn cohere_base_url(&self) -> String {
        format!("http://{}/cohere/v1", self.addr)
    }

    /// Number of requests received on any protocol
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::SeqCst)
    }

    /// Number of response streams still being written
    pub fn open_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::SeqCst)
    }

    /// Body of the most recent request
    pub fn last_body(&self) -> Option<Value> {
        self.state.last_body.lock().unwrap().clone()
    }

    /// Credential header of the most recent request
    pub fn last_credential(&self) -> Option<String> {
        self.state.last_credential.lock().unwrap().clone()
    }
}

impl Drop for MockVendor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MockState {
    /// Record the request; returns the rejection when the mock refuses everything
    fn record(&self, headers: &HeaderMap, credential_header: &str, body: &Value) -> Option<Response> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        *self.last_body.lock().unwrap() = Some(body.clone());
        *self.last_credential.lock().unwrap() = headers
            .get(credential_header)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        match self.mode {
            Mode::Reject(status) => {
                let status = StatusCode::from_u16(status).unwrap();
                Some((status, Json(json!({"error": {"message": "mock vendor refused"}}))).into_response())
            }
            _ => None,
        }
    }

    fn stream_response(self: &Arc<Self>, frames: Vec<String>, content_type: &'static str) -> Response {
        let guard = OpenStream::new(Arc::clone(self));
        let frames = frames.into_iter().map(|frame| Ok(Bytes::from(frame)));

        let body: BoxStream<'static, Result<Bytes, io::Error>> = match self.mode {
            Mode::BreakAfter(n) => stream::iter(frames.take(n).collect::<Vec<_>>())
                .chain(stream::once(async {
                    Err(io::Error::new(io::ErrorKind::ConnectionReset, "mock vendor hung up"))
                }))
                .boxed(),
            Mode::StallAfter(n) => stream::iter(frames.take(n).collect::<Vec<_>>())
                .chain(stream::pending())
                .boxed(),
            Mode::Complete | Mode::Reject(_) | Mode::OmitUsage => stream::iter(frames.collect::<Vec<_>>()).boxed(),
        };

        let body = body.map(move |frame| {
            let _open = &guard;
            frame
        });

        ([(header::CONTENT_TYPE, content_type)], Body::from_stream(body)).into_response()
    }
}

/// Counts a response stream as open until the server drops it
struct OpenStream(Arc<MockState>);

impl OpenStream {
    fn new(state: Arc<MockState>) -> Self {
        state.open_streams.fetch_add(1, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.0.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

fn sse(event: Option<&str>, data: &Value) -> String {
    match event {
        Some(name) => format!("event: {name}\ndata: {data}\n\n"),
        None => format!("data: {data}\n\n"),
    }
}

fn requested_model(body: &Value) -> String {
    body["model"].as_str().unwrap_or_default().to_owned()
}

// -- OpenAI-compatible --

async fn openai_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(rejected) = state.record(&headers, "authorization", &body) {
        return rejected;
    }
    let model = requested_model(&body);

    if body["stream"].as_bool() != Some(true) {
        return Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": full_text()},
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": PROMPT_TOKENS,
                "completion_tokens": COMPLETION_TOKENS,
                "total_tokens": PROMPT_TOKENS + COMPLETION_TOKENS
            }
        }))
        .into_response();
    }

    let chunk = |choices: Value, usage: Value| {
        sse(
            None,
            &json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000,
                "model": model,
                "choices": choices,
                "usage": usage
            }),
        )
    };

    let mut frames: Vec<String> = FRAGMENTS
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let delta = if i == 0 {
                json!({"role": "assistant", "content": text})
            } else {
                json!({"content": text})
            };
            chunk(json!([{"index": 0, "delta": delta, "finish_reason": null}]), Value::Null)
        })
        .collect();
    frames.push(chunk(
        json!([{"index": 0, "delta": {}, "finish_reason": "stop"}]),
        Value::Null,
    ));
    let omit_usage = matches!(state.mode, Mode::OmitUsage);
    if body["stream_options"]["include_usage"].as_bool() == Some(true) && !omit_usage {
        frames.push(chunk(
            json!([]),
            json!({
                "prompt_tokens": PROMPT_TOKENS,
                "completion_tokens": COMPLETION_TOKENS,
                "total_tokens": PROMPT_TOKENS + COMPLETION_TOKENS
            }),
        ));
    }
    frames.push("data: [DONE]\n\n".to_owned());

    state.stream_response(frames, "text/event-stream")
}

// -- Anthropic --

async fn anthropic_messages(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejected) = state.record(&headers, "x-api-key", &body) {
        return rejected;
    }
    let model = requested_model(&body);

    if body["stream"].as_bool() != Some(true) {
        return Json(json!({
            "id": "msg_mock",
            "type": "message",
            "role": "assistant",
            "model": model,
            "content": [{"type": "text", "text": full_text()}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": PROMPT_TOKENS, "output_tokens": COMPLETION_TOKENS}
        }))
        .into_response();
    }

    let mut frames = vec![
        sse(
            Some("message_start"),
            &json!({
                "type": "message_start",
                "message": {
                    "id": "msg_mock",
                    "type": "message",
                    "role": "assistant",
                    "model": model,
                    "content": [],
                    "usage": {"input_tokens": PROMPT_TOKENS, "output_tokens": 1}
                }
            }),
        ),
        sse(
            Some("content_block_start"),
            &json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ),
        sse(Some("ping"), &json!({"type": "ping"})),
    ];
    frames.extend(FRAGMENTS.iter().map(|text| {
        sse(
            Some("content_block_delta"),
            &json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}}),
        )
    }));
    frames.push(sse(
        Some("content_block_stop"),
        &json!({"type": "content_block_stop", "index": 0}),
    ));
    frames.push(sse(
        Some("message_delta"),
        &json!({
            "type": "message_delta",
            "delta": {"stop_reason": "end_turn", "stop_sequence": null},
            "usage": {"output_tokens": COMPLETION_TOKENS}
        }),
    ));
    frames.push(sse(Some("message_stop"), &json!({"type": "message_stop"})));

    state.stream_response(frames, "text/event-stream")
}

// -- Gemini --

async fn google_generate(
    State(state): State<Arc<MockState>>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejected) = state.record(&headers, "x-goog-api-key", &body) {
        return rejected;
    }
    let Some((model, method)) = action.split_once(':') else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let usage = json!({
        "promptTokenCount": PROMPT_TOKENS,
        "candidatesTokenCount": COMPLETION_TOKENS,
        "totalTokenCount": PROMPT_TOKENS + COMPLETION_TOKENS
    });

    if method == "generateContent" {
        return Json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": full_text()}]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": usage,
            "modelVersion": model,
            "responseId": "resp-mock"
        }))
        .into_response();
    }

    let last = FRAGMENTS.len() - 1;
    let frames = FRAGMENTS
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let mut candidate = json!({"content": {"role": "model", "parts": [{"text": text}]}, "index": 0});
            let mut frame = json!({"modelVersion": model, "responseId": "resp-mock"});
            if i == last {
                candidate["finishReason"] = json!("STOP");
                frame["usageMetadata"] = usage.clone();
            }
            frame["candidates"] = json!([candidate]);
            sse(None, &frame)
        })
        .collect();

    state.stream_response(frames, "text/event-stream")
}

// -- Cohere --

async fn cohere_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(rejected) = state.record(&headers, "authorization", &body) {
        return rejected;
    }

    let response = json!({
        "text": full_text(),
        "generation_id": "gen-mock",
        "finish_reason": "COMPLETE",
        "meta": {"billed_units": {"input_tokens": PROMPT_TOKENS, "output_tokens": COMPLETION_TOKENS}}
    });

    if body["stream"].as_bool() != Some(true) {
        return Json(response).into_response();
    }

    let mut frames = vec![format!(
        "{}\n",
        json!({"is_finished": false, "event_type": "stream-start", "generation_id": "gen-mock"})
    )];
    frames.extend(FRAGMENTS.iter().map(|text| {
        format!(
            "{}\n",
            json!({"is_finished": false, "event_type": "text-generation", "text": text})
        )
    }));
    frames.push(format!(
        "{}\n",
        json!({"is_finished": true, "event_type": "stream-end", "finish_reason": "COMPLETE", "response": response})
    ));

    state.stream_response(frames, "application/stream+json")
}
