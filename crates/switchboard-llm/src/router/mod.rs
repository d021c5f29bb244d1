//! Axum route handlers for the chat completion and model listing endpoints

mod ollama;

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt};
use switchboard_config::Credentials;
use switchboard_core::HttpError;
use tokio_util::sync::CancellationToken;

pub use ollama::ollama_router;

use crate::adapter::{Adapter, AdapterContext};
use crate::error::LlmError;
use crate::registry;
use crate::stream::ChunkStream;
use crate::types::{ChatRequest, ModelList};

/// Shared state for LLM route handlers
///
/// Holds the credential snapshot; the adapter set is rebuilt from it for
/// every request.
#[derive(Clone)]
pub struct LlmState {
    inner: Arc<LlmStateInner>,
}

struct LlmStateInner {
    credentials: Credentials,
    context: AdapterContext,
}

impl LlmState {
    /// State serving the vendors configured in `credentials`
    pub fn new(credentials: Credentials, context: AdapterContext) -> Self {
        Self {
            inner: Arc::new(LlmStateInner { credentials, context }),
        }
    }
}

/// Build the LLM router with all endpoints
pub fn llm_router(state: LlmState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/models", routing::get(list_models))
        .with_state(state)
}

/// Parse a chat body and pick the adapter serving its model
fn route_chat(
    state: &LlmState,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<(ChatRequest, Arc<dyn Adapter>), LlmError> {
    let Json(request) = body.map_err(|rejection| LlmError::InvalidRequest(rejection.body_text()))?;
    let adapters = registry::list_adapters(&state.inner.credentials, &state.inner.context);
    let adapter = Arc::clone(registry::dispatch(&request.model, &adapters)?);
    Ok((request, adapter))
}

/// Models of every configured adapter
fn configured_models(state: &LlmState) -> ModelList {
    let adapters = registry::list_adapters(&state.inner.credentials, &state.inner.context);
    registry::list_models(&adapters)
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(State(state): State<LlmState>, body: Result<Json<ChatRequest>, JsonRejection>) -> Response {
    let (request, adapter) = match route_chat(&state, body) {
        Ok(routed) => routed,
        Err(e) => return error_response(&e),
    };

    if request.stream {
        match adapter.stream(&request, CancellationToken::new()).await {
            Ok(chunks) => stream_response(chunks).into_response(),
            Err(e) => error_response(&e),
        }
    } else {
        match adapter.invoke(&request).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

/// Handle `GET /v1/models`
async fn list_models(State(state): State<LlmState>) -> Response {
    Json(configured_models(&state)).into_response()
}

/// Write each chunk as one SSE `data` event
///
/// A terminal error becomes a final `{"error": ...}` event. Dropping the
/// response body (client disconnect) drops `chunks`, which cancels the
/// vendor stream.
fn stream_response(chunks: ChunkStream) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = chunks.map(|item| match item {
        Ok(chunk) => Event::default().json_data(chunk),
        Err(e) => {
            tracing::warn!(error = %e, status = %e.status_code(), "stream failed after headers were sent");
            Event::default().json_data(e.to_body())
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Convert an LLM error to a `{"error": ...}` JSON response
fn error_response(error: &LlmError) -> Response {
    let status = error.status_code();
    if status.is_server_error() {
        tracing::error!(error = %error, error_type = error.error_type(), "request failed");
    } else {
        tracing::debug!(error = %error, error_type = error.error_type(), "request rejected");
    }

    (status, Json(error.to_body())).into_response()
}
