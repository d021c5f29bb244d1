//! Ollama-compatible chat and tag endpoints
//!
//! Ollama clients cannot send a bearer header, so the shared secret is the
//! `{api_key}` path segment. Checking it is left to the caller, which wraps
//! [`ollama_router`] in a route layer.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt, stream};
use switchboard_core::HttpError;
use tokio_util::sync::CancellationToken;

use super::{LlmState, configured_models, error_response, route_chat};
use crate::convert::ollama::{self as convert, OllamaLines};
use crate::stream::ChunkStream;
use crate::types::ChatRequest;

/// Content type of streamed `/api/chat` replies
const NDJSON: &str = "application/x-ndjson";

/// Build the Ollama router, rooted at `/ollama/{api_key}/v1`
pub fn ollama_router(state: LlmState) -> Router {
    Router::new()
        .route("/ollama/{api_key}/v1", routing::get(liveness))
        .route("/ollama/{api_key}/v1/", routing::get(liveness))
        .route("/ollama/{api_key}/v1/api/chat", routing::post(chat))
        .route("/ollama/{api_key}/v1/api/tags", routing::get(tags))
        .with_state(state)
}

/// Liveness text Ollama clients look for
async fn liveness() -> &'static str {
    "Ollama is running"
}

/// Handle `POST /api/chat`
async fn chat(State(state): State<LlmState>, body: Result<Json<ChatRequest>, JsonRejection>) -> Response {
    let (mut request, adapter) = match route_chat(&state, body) {
        Ok(routed) => routed,
        Err(e) => return error_response(&e),
    };
    // `options`, `keep_alive` and friends mean nothing to the vendors
    request.extra.clear();

    if request.stream {
        match adapter.stream(&request, CancellationToken::new()).await {
            Ok(chunks) => ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(ndjson_lines(chunks))).into_response(),
            Err(e) => error_response(&e),
        }
    } else {
        match adapter.invoke(&request).await {
            Ok(response) => Json(convert::response(response)).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

/// Handle `GET /api/tags`
async fn tags(State(state): State<LlmState>) -> Response {
    Json(convert::models(configured_models(&state))).into_response()
}

/// One JSON object per line
///
/// A terminal error becomes a final `{"error": ...}` line. Dropping the
/// body drops `chunks`, which cancels the vendor stream.
fn ndjson_lines(chunks: ChunkStream) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold(Some((chunks, OllamaLines::new())), |state| async move {
        let (mut chunks, mut lines) = state?;
        loop {
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    let batch = lines.push(chunk);
                    if !batch.is_empty() {
                        return Some((encode(&batch), Some((chunks, lines))));
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, status = %e.status_code(), "ollama stream failed after headers were sent");
                    return Some((encode(&[e.to_body()]), None));
                }
                None => return lines.finish().map(|last| (encode(&[last]), None)),
            }
        }
    })
    .map(Ok)
}

fn encode<T: serde::Serialize>(items: &[T]) -> Bytes {
    let mut buf = Vec::new();
    for item in items {
        // Serializing these plain structs cannot fail
        if serde_json::to_writer(&mut buf, item).is_ok() {
            buf.push(b'\n');
        }
    }
    Bytes::from(buf)
}
