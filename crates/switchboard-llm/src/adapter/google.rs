//! Google Gemini `generateContent` adapter

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use switchboard_config::Credentials;
use tokio_util::sync::CancellationToken;

use super::{Adapter, AdapterContext};
use crate::convert::google::{self as convert, GoogleDecoder};
use crate::error::LlmError;
use crate::media;
use crate::protocol::google::{GoogleRequest, GoogleResponse};
use crate::stream::{ChunkStream, sse_events};
use crate::types::{ChatRequest, ChatResponse};

/// Required keys
pub const REQUIRED_KEYS: &[&str] = &["GOOGLE_GEN_AI_API_KEY"];

/// Optional keys
pub const OPTIONAL_KEYS: &[&str] = &["GOOGLE_GEN_AI_BASE_URL"];

/// Default Gemini API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.5-flash-preview-05-20",
    "gemini-2.5-pro-preview-05-06",
    "gemini-2.0-flash",
    "gemini-2.0-flash-001",
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash-lite-001",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
    "gemini-1.5-pro",
];

/// Google Gemini adapter
#[derive(Debug)]
pub struct GoogleAdapter {
    context: AdapterContext,
    api_key: SecretString,
    models_url: String,
    models: Vec<String>,
}

impl GoogleAdapter {
    /// Build from credentials
    pub fn new(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<Self> {
        let api_key = SecretString::from(super::require(credentials, "GOOGLE_GEN_AI_API_KEY")?);
        let base_url = super::base_url(credentials, "GOOGLE_GEN_AI_BASE_URL", DEFAULT_BASE_URL)?;

        Ok(Self {
            context: context.clone(),
            api_key,
            models_url: super::endpoint(&base_url, "models"),
            models: super::model_ids(MODELS),
        })
    }

    fn method_url(&self, model: &str, stream: bool) -> String {
        if stream {
            format!("{}/{model}:streamGenerateContent?alt=sse", self.models_url)
        } else {
            format!("{}/{model}:generateContent", self.models_url)
        }
    }

    async fn build_request(&self, req: &ChatRequest) -> Result<GoogleRequest, LlmError> {
        crate::convert::check_parts(&req.messages, convert::ACCEPTED_PARTS)?;
        let images = media::resolve_all(&self.context.client, crate::convert::user_image_references(&req.messages)).await?;
        convert::request(req, &req.model, images)
    }

    async fn post(&self, req: &ChatRequest, stream: bool) -> Result<reqwest::Response, LlmError> {
        let body = self.build_request(req).await?;
        let request = self
            .context
            .client
            .post(self.method_url(&req.model, stream))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body);

        super::send("google", request).await
    }
}

#[async_trait]
impl Adapter for GoogleAdapter {
    fn name(&self) -> &str {
        "google"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        tracing::debug!(vendor = "google", model = %request.model, "sending generateContent request");
        let response = self.post(request, false).await?;
        let response: GoogleResponse = super::read_json("google", response).await?;

        convert::response(response, &request.model)
    }

    async fn stream(&self, request: &ChatRequest, cancel: CancellationToken) -> Result<ChunkStream, LlmError> {
        tracing::debug!(vendor = "google", model = %request.model, "opening streamGenerateContent stream");
        let response = self.post(request, true).await?;

        Ok(super::chunk_stream(
            sse_events(response, GoogleDecoder::new()),
            request,
            cancel,
            &self.context,
        ))
    }
}
