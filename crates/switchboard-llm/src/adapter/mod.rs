//! Vendor adapters
//!
//! Each adapter owns one vendor's wire protocol: it translates a
//! [`ChatRequest`] into the vendor payload, performs the call, and maps the
//! answer back onto the canonical contract. Adapters are plain values built
//! from a [`Credentials`] snapshot and never mutated afterwards.

pub mod anthropic;
pub mod cohere;
pub mod google;
pub mod openai;
pub mod openai_compat;
pub mod vertex;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use switchboard_config::{Credentials, DEFAULT_STREAM_BUFFER};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::LlmError;
use crate::stream::{ChunkStream, StreamMachine, VendorEventStream, spawn_chunk_stream};
use crate::types::{ChatRequest, ChatResponse};

/// Shared resources handed to every adapter
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// HTTP client used for vendor calls and image fetches
    pub client: Client,
    /// Capacity of the channel between a stream producer and its consumer
    pub stream_buffer: usize,
}

impl AdapterContext {
    /// Context with the given client and channel capacity
    pub const fn new(client: Client, stream_buffer: usize) -> Self {
        Self { client, stream_buffer }
    }
}

impl Default for AdapterContext {
    fn default() -> Self {
        Self::new(Client::new(), DEFAULT_STREAM_BUFFER)
    }
}

/// One vendor backend
#[async_trait]
pub trait Adapter: std::fmt::Debug + Send + Sync {
    /// Registry name, reported as `owned_by` in model listings
    fn name(&self) -> &str;

    /// Configuration keys that must be present for this adapter to exist
    fn required_keys(&self) -> &'static [&'static str];

    /// Public model ids this adapter serves
    fn models(&self) -> &[String];

    /// Whether `model` is one of [`Adapter::models`]
    fn supports(&self, model: &str) -> bool {
        self.models().iter().any(|m| m == model)
    }

    /// Perform a non-streaming completion
    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Open a streaming completion
    ///
    /// Errors detected before the vendor answers are returned directly; later
    /// failures arrive as the final item of the stream. Cancelling `cancel`
    /// stops the stream and releases the vendor connection.
    async fn stream(&self, request: &ChatRequest, cancel: CancellationToken) -> Result<ChunkStream, LlmError>;
}

/// Send a vendor request, failing on transport errors and non-success statuses
pub(crate) async fn send(vendor: &str, request: RequestBuilder) -> Result<Response, LlmError> {
    let response = request.send().await.map_err(|e| {
        tracing::error!(vendor, error = %e, "upstream request failed");
        LlmError::upstream(format!("{vendor} request failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(vendor, status = %status, body = %body, "upstream returned error");
        return Err(LlmError::upstream_status(status, &body));
    }

    Ok(response)
}

/// Deserialize a complete vendor response body
pub(crate) async fn read_json<T: DeserializeOwned>(vendor: &str, response: Response) -> Result<T, LlmError> {
    response.json::<T>().await.map_err(|e| {
        tracing::error!(vendor, error = %e, "failed to parse upstream response");
        LlmError::upstream(format!("invalid {vendor} response: {e}"))
    })
}

/// Run decoded vendor events through a fresh state machine
pub(crate) fn chunk_stream(
    events: VendorEventStream,
    request: &ChatRequest,
    cancel: CancellationToken,
    context: &AdapterContext,
) -> ChunkStream {
    let machine = StreamMachine::new(request.model.clone(), request.include_usage());
    spawn_chunk_stream(events, machine, cancel, context.stream_buffer)
}

/// Required credential, or an internal error naming the key
pub(crate) fn require<'a>(credentials: &'a Credentials, key: &str) -> anyhow::Result<&'a str> {
    credentials
        .get(key)
        .ok_or_else(|| anyhow::anyhow!("missing credential {key}"))
}

/// Base URL from an override key, else the vendor default
pub(crate) fn base_url(credentials: &Credentials, override_key: &str, default: &str) -> anyhow::Result<Url> {
    let raw = credentials.get(override_key).unwrap_or(default);
    Url::parse(raw).map_err(|e| anyhow::anyhow!("invalid {override_key} `{raw}`: {e}"))
}

/// Append a path to a base URL without dropping the base's own path
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Comma-separated list with blanks removed
pub(crate) fn csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Owned model ids from a static list
pub(crate) fn model_ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| (*id).to_owned()).collect()
}
