//! Anthropic models hosted on Google Vertex AI
//!
//! Authentication uses a service account: a signed JWT is exchanged for an
//! OAuth access token, which is then sent as a bearer token to `rawPredict`.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use switchboard_config::Credentials;
use tokio_util::sync::CancellationToken;

use super::{Adapter, AdapterContext};
use crate::convert::anthropic::{self as convert, AnthropicDecoder};
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse};
use crate::stream::{ChunkStream, sse_events};
use crate::types::{ChatRequest, ChatResponse};

/// Required keys
pub const REQUIRED_KEYS: &[&str] = &[
    "VERTEX_ANTROPIC_GOOGLE_SA_CLIENT_EMAIL",
    "VERTEX_ANTROPIC_GOOGLE_SA_PRIVATE_KEY",
    "VERTEX_ANTROPIC_REGION",
    "VERTEX_ANTROPIC_PROJECTID",
];

/// Optional keys
pub const OPTIONAL_KEYS: &[&str] = &["VERTEX_ANTROPIC_BASE_URL", "VERTEX_ANTROPIC_TOKEN_URL"];

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: u64 = 3600;

/// Messages API version expected by Vertex
const VERTEX_VERSION: &str = "vertex-2023-10-16";

const MODELS: &[&str] = &[
    "claude-opus-4@20250514",
    "claude-sonnet-4@20250514",
    "claude-3-7-sonnet@20250219",
    "claude-3-5-sonnet-v2@20241022",
    "claude-3-5-haiku@20241022",
    "claude-3-5-sonnet@20240620",
    "claude-3-haiku@20240307",
    "claude-3-opus@20240229",
    "claude-3-sonnet@20240229",
];

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Vertex AI `rawPredict` adapter for Claude models
pub struct VertexAnthropicAdapter {
    context: AdapterContext,
    client_email: String,
    signing_key: EncodingKey,
    token_url: String,
    publisher_url: String,
    models: Vec<String>,
}

impl std::fmt::Debug for VertexAnthropicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexAnthropicAdapter")
            .field("client_email", &self.client_email)
            .field("publisher_url", &self.publisher_url)
            .finish_non_exhaustive()
    }
}

impl VertexAnthropicAdapter {
    /// Build from credentials
    ///
    /// The private key may carry escaped `\n` sequences, as is common when a
    /// PEM block is stored in a single environment variable.
    pub fn new(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<Self> {
        let client_email = super::require(credentials, "VERTEX_ANTROPIC_GOOGLE_SA_CLIENT_EMAIL")?.to_owned();
        let pem = super::require(credentials, "VERTEX_ANTROPIC_GOOGLE_SA_PRIVATE_KEY")?.replace("\\n", "\n");
        let region = super::require(credentials, "VERTEX_ANTROPIC_REGION")?;
        let project = super::require(credentials, "VERTEX_ANTROPIC_PROJECTID")?;

        let signing_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid VERTEX_ANTROPIC_GOOGLE_SA_PRIVATE_KEY: {e}"))?;

        let default_base = format!("https://{region}-aiplatform.googleapis.com/v1");
        let base = super::base_url(credentials, "VERTEX_ANTROPIC_BASE_URL", &default_base)?;
        let publisher_url = super::endpoint(
            &base,
            &format!("projects/{project}/locations/{region}/publishers/anthropic/models"),
        );

        Ok(Self {
            context: context.clone(),
            client_email,
            signing_key,
            token_url: credentials
                .get("VERTEX_ANTROPIC_TOKEN_URL")
                .unwrap_or(DEFAULT_TOKEN_URL)
                .to_owned(),
            publisher_url,
            models: super::model_ids(MODELS),
        })
    }

    fn predict_url(&self, model: &str, stream: bool) -> String {
        let method = if stream { "streamRawPredict" } else { "rawPredict" };
        format!("{}/{model}:{method}", self.publisher_url)
    }

    fn assertion(&self) -> Result<String, LlmError> {
        let iat = crate::types::unix_now();
        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPE,
            aud: &self.token_url,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| LlmError::Internal(anyhow::anyhow!("failed to sign service account JWT: {e}")))
    }

    /// Exchange a freshly signed JWT for an access token
    async fn access_token(&self) -> Result<SecretString, LlmError> {
        let assertion = self.assertion()?;
        let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = super::send("vertex-anthropic", self.context.client.post(&self.token_url).form(&form)).await?;
        let token: TokenResponse = super::read_json("vertex-anthropic", response).await?;

        Ok(SecretString::from(token.access_token))
    }

    async fn post(&self, model: &str, body: &AnthropicRequest) -> Result<reqwest::Response, LlmError> {
        let token = self.access_token().await?;
        let request = self
            .context
            .client
            .post(self.predict_url(model, body.stream))
            .bearer_auth(token.expose_secret())
            .json(body);

        super::send("vertex-anthropic", request).await
    }

    async fn build_request(&self, req: &ChatRequest, stream: bool) -> Result<AnthropicRequest, LlmError> {
        let mut body = super::anthropic::build_request(&self.context, req, None, stream).await?;
        body.anthropic_version = Some(VERTEX_VERSION);
        Ok(body)
    }
}

#[async_trait]
impl Adapter for VertexAnthropicAdapter {
    fn name(&self) -> &str {
        "vertex-anthropic"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = self.build_request(request, false).await?;

        tracing::debug!(vendor = "vertex-anthropic", model = %request.model, "sending rawPredict request");
        let response = self.post(&request.model, &body).await?;
        let response: AnthropicResponse = super::read_json("vertex-anthropic", response).await?;

        convert::response(response, &request.model)
    }

    async fn stream(&self, request: &ChatRequest, cancel: CancellationToken) -> Result<ChunkStream, LlmError> {
        let body = self.build_request(request, true).await?;

        tracing::debug!(vendor = "vertex-anthropic", model = %request.model, "opening streamRawPredict stream");
        let response = self.post(&request.model, &body).await?;

        Ok(super::chunk_stream(
            sse_events(response, AnthropicDecoder::new()),
            request,
            cancel,
            &self.context,
        ))
    }
}
