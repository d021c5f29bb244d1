//! `OpenAI`: chat completions for older models, the Responses API for newer ones

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use switchboard_config::Credentials;
use tokio_util::sync::CancellationToken;

use super::openai_compat::{OpenAiCompatAdapter, same_ids};
use super::{Adapter, AdapterContext};
use crate::convert::openai::TokenField;
use crate::convert::responses::{self as convert, ResponsesDecoder};
use crate::error::LlmError;
use crate::protocol::openai::{ResponsesRequest, ResponsesResponse};
use crate::stream::{ChunkStream, sse_events};
use crate::types::{ChatRequest, ChatResponse};

/// Required keys
pub const REQUIRED_KEYS: &[&str] = &["OPENAI_API_KEY"];

/// Optional keys
pub const OPTIONAL_KEYS: &[&str] = &["OPENAI_BASE_URL"];

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Served through chat completions
const CHAT_MODELS: &[&str] = &[
    "chatgpt-4o-latest",
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-0125",
    "gpt-3.5-turbo-1106",
    "gpt-3.5-turbo-16k",
    "gpt-4",
    "gpt-4-0125-preview",
    "gpt-4-0613",
    "gpt-4-1106-preview",
    "gpt-4-turbo",
    "gpt-4-turbo-2024-04-09",
    "gpt-4-turbo-preview",
    "gpt-4o",
    "gpt-4o-2024-05-13",
    "gpt-4o-2024-08-06",
    "gpt-4o-2024-11-20",
    "gpt-4o-mini",
    "gpt-4o-mini-2024-07-18",
    "gpt-4o-mini-search-preview",
    "gpt-4o-mini-search-preview-2025-03-11",
    "gpt-4o-search-preview",
    "gpt-4o-search-preview-2025-03-11",
    "o1-mini",
    "o1-mini-2024-09-12",
];

/// Served through the Responses API
const RESPONSES_MODELS: &[&str] = &[
    "gpt-5",
    "gpt-5-2025-08-07",
    "gpt-5-mini",
    "gpt-5-mini-2025-08-07",
    "gpt-5-nano",
    "gpt-5-nano-2025-08-07",
    "gpt-5-chat-latest",
    "o1",
    "o1-2024-12-17",
    "o1-pro",
    "o1-pro-2025-03-19",
    "o3",
    "o3-2025-04-16",
    "o3-mini",
    "o3-mini-2025-01-31",
    "o3-pro",
    "o3-pro-2025-06-10",
    "o3-deep-research",
    "o3-deep-research-2025-06-26",
    "o4-mini",
    "o4-mini-2025-04-16",
    "o4-mini-deep-research",
    "o4-mini-deep-research-2025-06-26",
    "gpt-4.1",
    "gpt-4.1-2025-04-14",
    "gpt-4.1-mini",
    "gpt-4.1-mini-2025-04-14",
    "gpt-4.1-nano",
    "gpt-4.1-nano-2025-04-14",
];

/// `OpenAI` adapter
///
/// Legacy chat models are delegated to the generic compatible adapter;
/// everything else goes through `/responses`.
#[derive(Debug)]
pub struct OpenAiAdapter {
    chat: OpenAiCompatAdapter,
    context: AdapterContext,
    api_key: SecretString,
    responses_url: String,
    models: Vec<String>,
}

impl OpenAiAdapter {
    /// Build from credentials
    pub fn new(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<Self> {
        let api_key = SecretString::from(super::require(credentials, "OPENAI_API_KEY")?);
        let base = super::base_url(credentials, "OPENAI_BASE_URL", DEFAULT_BASE_URL)?;

        let chat = OpenAiCompatAdapter::hosted(
            "openai",
            REQUIRED_KEYS,
            credentials,
            context,
            ("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            same_ids(CHAT_MODELS),
        )?
        .with_token_field(TokenField::MaxCompletionTokens);

        let models = chat
            .models()
            .iter()
            .cloned()
            .chain(super::model_ids(RESPONSES_MODELS))
            .collect();

        Ok(Self {
            chat,
            context: context.clone(),
            api_key,
            responses_url: super::endpoint(&base, "responses"),
            models,
        })
    }

    fn uses_chat(&self, model: &str) -> bool {
        self.chat.supports(model)
    }

    fn prepare(&self, req: &ChatRequest, stream: bool) -> Result<ResponsesRequest, LlmError> {
        crate::convert::check_parts(&req.messages, convert::ACCEPTED_PARTS)?;
        let mut body = convert::request(req, &req.model)?;
        body.stream = stream;
        Ok(body)
    }

    fn post(&self, body: &ResponsesRequest) -> reqwest::RequestBuilder {
        self.context
            .client
            .post(&self.responses_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
    }
}

#[async_trait]
impl Adapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        if self.uses_chat(&request.model) {
            return self.chat.invoke(request).await;
        }

        let body = self.prepare(request, false)?;
        tracing::debug!(vendor = "openai", model = %request.model, "sending responses request");
        let response = super::send("openai", self.post(&body)).await?;
        let response: ResponsesResponse = super::read_json("openai", response).await?;

        convert::response(response, &request.model)
    }

    async fn stream(&self, request: &ChatRequest, cancel: CancellationToken) -> Result<ChunkStream, LlmError> {
        if self.uses_chat(&request.model) {
            return self.chat.stream(request, cancel).await;
        }

        let body = self.prepare(request, true)?;
        tracing::debug!(vendor = "openai", model = %request.model, "opening responses stream");
        let response = super::send("openai", self.post(&body)).await?;

        Ok(super::chunk_stream(
            sse_events(response, ResponsesDecoder::new()),
            request,
            cancel,
            &self.context,
        ))
    }
}
