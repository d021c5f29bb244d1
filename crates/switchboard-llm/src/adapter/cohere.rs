//! Cohere v1 chat adapter

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use switchboard_config::Credentials;
use tokio_util::sync::CancellationToken;

use super::{Adapter, AdapterContext};
use crate::convert::cohere::{self as convert, CohereDecoder};
use crate::error::LlmError;
use crate::protocol::cohere::{CohereRequest, CohereResponse};
use crate::stream::{ChunkStream, ndjson_events};
use crate::types::{ChatRequest, ChatResponse};

/// Required keys
pub const REQUIRED_KEYS: &[&str] = &["COHERE_API_KEY"];

/// Optional keys
pub const OPTIONAL_KEYS: &[&str] = &["COHERE_BASE_URL"];

const DEFAULT_BASE_URL: &str = "https://api.cohere.com/v1";

const MODELS: &[&str] = &[
    "command-r",
    "command-r-plus",
    "command-nightly",
    "command-light-nightly",
    "command",
    "command-r-08-2024",
    "command-r-plus-08-2024",
    "command-light",
];

/// Cohere adapter
#[derive(Debug)]
pub struct CohereAdapter {
    context: AdapterContext,
    api_key: SecretString,
    chat_url: String,
    models: Vec<String>,
}

impl CohereAdapter {
    /// Build from credentials
    pub fn new(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<Self> {
        let api_key = SecretString::from(super::require(credentials, "COHERE_API_KEY")?);
        let base_url = super::base_url(credentials, "COHERE_BASE_URL", DEFAULT_BASE_URL)?;

        Ok(Self {
            context: context.clone(),
            api_key,
            chat_url: super::endpoint(&base_url, "chat"),
            models: super::model_ids(MODELS),
        })
    }

    fn prepare(req: &ChatRequest, stream: bool) -> Result<CohereRequest, LlmError> {
        crate::convert::check_parts(&req.messages, convert::ACCEPTED_PARTS)?;
        let mut body = convert::request(req, &req.model)?;
        body.stream = stream;
        Ok(body)
    }

    async fn post(&self, body: &CohereRequest) -> Result<reqwest::Response, LlmError> {
        let request = self
            .context
            .client
            .post(&self.chat_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body);

        super::send("cohere", request).await
    }
}

#[async_trait]
impl Adapter for CohereAdapter {
    fn name(&self) -> &str {
        "cohere"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = Self::prepare(request, false)?;

        tracing::debug!(vendor = "cohere", model = %request.model, "sending chat request");
        let response = self.post(&body).await?;
        let response: CohereResponse = super::read_json("cohere", response).await?;

        convert::response(response, &request.model)
    }

    async fn stream(&self, request: &ChatRequest, cancel: CancellationToken) -> Result<ChunkStream, LlmError> {
        let body = Self::prepare(request, true)?;

        tracing::debug!(vendor = "cohere", model = %request.model, "opening chat stream");
        let response = self.post(&body).await?;

        Ok(super::chunk_stream(
            ndjson_events(response, CohereDecoder::new()),
            request,
            cancel,
            &self.context,
        ))
    }
}
