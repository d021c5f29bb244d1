//! Anthropic Messages API adapter

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use switchboard_config::Credentials;
use tokio_util::sync::CancellationToken;

use super::{Adapter, AdapterContext};
use crate::convert::anthropic::{self as convert, AnthropicDecoder};
use crate::error::LlmError;
use crate::media;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse};
use crate::stream::{ChunkStream, sse_events};
use crate::types::{ChatRequest, ChatResponse};

/// Required keys
pub const REQUIRED_KEYS: &[&str] = &["ANTROPIC_API_KEY"];

/// Optional keys
pub const OPTIONAL_KEYS: &[&str] = &["ANTROPIC_BASE_URL"];

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

const MODELS: &[&str] = &[
    "claude-opus-4-20250514",
    "claude-sonnet-4-20250514",
    "claude-3-7-sonnet-20250219",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-5-sonnet-20240620",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

/// Anthropic Messages API adapter
#[derive(Debug)]
pub struct AnthropicAdapter {
    context: AdapterContext,
    api_key: SecretString,
    messages_url: String,
    models: Vec<String>,
}

impl AnthropicAdapter {
    /// Build from credentials
    pub fn new(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<Self> {
        let api_key = SecretString::from(super::require(credentials, "ANTROPIC_API_KEY")?);
        let base_url = super::base_url(credentials, "ANTROPIC_BASE_URL", DEFAULT_BASE_URL)?;

        Ok(Self {
            context: context.clone(),
            api_key,
            messages_url: super::endpoint(&base_url, "messages"),
            models: super::model_ids(MODELS),
        })
    }

    fn post(&self, body: &AnthropicRequest) -> reqwest::RequestBuilder {
        self.context
            .client
            .post(&self.messages_url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }
}

/// Translate a request into a Messages API body, resolving its images first
///
/// `model` is `None` for endpoints that address the model in the URL.
pub(super) async fn build_request(
    context: &AdapterContext,
    req: &ChatRequest,
    model: Option<String>,
    stream: bool,
) -> Result<AnthropicRequest, LlmError> {
    crate::convert::check_parts(&req.messages, convert::ACCEPTED_PARTS)?;
    let images = media::resolve_all(&context.client, crate::convert::user_image_references(&req.messages)).await?;

    let mut body = convert::request(req, model, &req.model, images)?;
    body.stream = stream;
    Ok(body)
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = build_request(&self.context, request, Some(request.model.clone()), false).await?;

        tracing::debug!(vendor = "anthropic", model = %request.model, "sending messages request");
        let response = super::send("anthropic", self.post(&body)).await?;
        let response: AnthropicResponse = super::read_json("anthropic", response).await?;

        convert::response(response, &request.model)
    }

    async fn stream(&self, request: &ChatRequest, cancel: CancellationToken) -> Result<ChunkStream, LlmError> {
        let body = build_request(&self.context, request, Some(request.model.clone()), true).await?;

        tracing::debug!(vendor = "anthropic", model = %request.model, "opening messages stream");
        let response = super::send("anthropic", self.post(&body)).await?;

        Ok(super::chunk_stream(
            sse_events(response, AnthropicDecoder::new()),
            request,
            cancel,
            &self.context,
        ))
    }
}
