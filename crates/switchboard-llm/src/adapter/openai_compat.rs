//! Vendors exposing an `OpenAI`-compatible chat completions endpoint

use async_trait::async_trait;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use switchboard_config::Credentials;
use tokio_util::sync::CancellationToken;

use super::{Adapter, AdapterContext};
use crate::convert::openai::{self as convert, OpenAiDecoder, TokenField};
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiChatRequest, OpenAiResponse};
use crate::stream::{ChunkStream, sse_events};
use crate::types::{ChatRequest, ChatResponse, StreamOptions};

/// Required keys for `DeepSeek`
pub const DEEPSEEK_KEYS: &[&str] = &["DEEPSEEK_API_KEY"];

/// Required keys for Moonshot
pub const MOONSHOT_KEYS: &[&str] = &["MOONSHOT_API_KEY"];

/// Required keys for 01.AI (Lingyiwanwu)
pub const LINGYIWANWU_KEYS: &[&str] = &["LINGYIWANWU_API_KEY"];

/// Required keys for Groq
pub const GROQ_KEYS: &[&str] = &["GROQ_API_KEY"];

/// Required keys for Azure `OpenAI`, which also names the deployed models
pub const AZURE_KEYS: &[&str] = &[
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_ENDPOINT",
    "AZURE_API_VERSION",
    "AZURE_DEPLOYMENT_MODELS",
];

/// Required keys for Alibaba Bailian
pub const BAILIAN_KEYS: &[&str] = &["ALIYUN_BAILIAN_API_KEY"];

/// Required keys for a local Ollama server; it takes no credential
pub const OLLAMA_KEYS: &[&str] = &["OLLAMA_BASE_URL"];

/// Required keys for xAI Grok
pub const GROK_KEYS: &[&str] = &["GROK_API_KEY"];

/// Required keys for `OpenRouter`
pub const OPENROUTER_KEYS: &[&str] = &["OPENROUTER_API_KEY"];

/// Required keys for Cerebras
pub const CEREBRAS_KEYS: &[&str] = &["CEREBRAS_API_KEY"];

/// Optional keys read by the vendors in this module
pub const OPTIONAL_KEYS: &[&str] = &[
    "DEEPSEEK_BASE_URL",
    "MOONSHOT_BASE_URL",
    "LINGYIWANWU_BASE_URL",
    "GROQ_BASE_URL",
    "ALIYUN_BAILIAN_BASE_URL",
    "ALIYUN_BAILIAN_MODELS",
    "OLLAMA_MODELS",
    "GROK_BASE_URL",
    "OPENROUTER_BASE_URL",
    "OPENROUTER_MODELS",
    "CEREBRAS_BASE_URL",
];

const DEEPSEEK_MODELS: &[&str] = &["deepseek-reasoner", "deepseek-chat", "deepseek-coder"];

const MOONSHOT_MODELS: &[&str] = &["moonshot-v1-8k", "moonshot-v1-32k", "moonshot-v1-128k"];

const LINGYIWANWU_MODELS: &[&str] = &[
    "yi-large",
    "yi-medium",
    "yi-vision",
    "yi-medium-200k",
    "yi-spark",
    "yi-large-rag",
    "yi-large-fc",
    "yi-large-turbo",
    "yi-large-preview",
];

const GROQ_MODELS: &[&str] = &[
    "distil-whisper-large-v3-en",
    "gemma2-9b-it",
    "gemma-7b-it",
    "llama-3.1-70b-versatile",
    "llama-3.1-8b-instant",
    "llama3-70b-8192",
    "llama3-8b-8192",
    "llama3-groq-70b-8192-tool-use-preview",
    "llama3-groq-8b-8192-tool-use-preview",
    "llama-guard-3-8b",
    "mixtral-8x7b-32768",
    "whisper-large-v3",
];

const GROK_MODELS: &[&str] = &[
    "grok-3-latest",
    "grok-3-fast-latest",
    "grok-3-mini-latest",
    "grok-3-mini-fast-latest",
];

const OPENROUTER_DEFAULT_MODELS: &[&str] = &[
    "anthropic/claude-opus-4.1",
    "anthropic/claude-opus-4",
    "anthropic/claude-sonnet-4",
    "anthropic/claude-3.5-sonnet",
    "anthropic/claude-3.5-haiku",
];

const CEREBRAS_MODELS: &[(&str, &str)] = &[
    ("cerebras/llama-3.1-70b", "llama-3-70b"),
    ("cerebras/llama-3.1-8b", "llama-3-8b"),
];

const BAILIAN_DEFAULT_MODEL: &str = "qwen-max";

#[derive(Debug)]
enum Auth {
    Bearer(SecretString),
    ApiKeyHeader(SecretString),
    None,
}

/// Where a public model id is sent
#[derive(Debug)]
struct Route {
    public: String,
    vendor_model: String,
    url: String,
}

/// Adapter for any `OpenAI`-compatible chat completions endpoint
#[derive(Debug)]
pub struct OpenAiCompatAdapter {
    name: &'static str,
    required_keys: &'static [&'static str],
    context: AdapterContext,
    auth: Auth,
    token_field: TokenField,
    models: Vec<String>,
    routes: Vec<Route>,
}

impl OpenAiCompatAdapter {
    fn new(name: &'static str, required_keys: &'static [&'static str], context: &AdapterContext, auth: Auth) -> Self {
        Self {
            name,
            required_keys,
            context: context.clone(),
            auth,
            token_field: TokenField::MaxTokens,
            models: Vec::new(),
            routes: Vec::new(),
        }
    }

    fn route(mut self, public: impl Into<String>, vendor_model: impl Into<String>, url: impl Into<String>) -> Self {
        let public = public.into();
        self.models.push(public.clone());
        self.routes.push(Route {
            public,
            vendor_model: vendor_model.into(),
            url: url.into(),
        });
        self
    }

    /// A bearer-authenticated vendor serving `(public, vendor)` model pairs at one base URL
    pub(super) fn hosted(
        name: &'static str,
        required_keys: &'static [&'static str],
        credentials: &Credentials,
        context: &AdapterContext,
        (base_key, default_base): (&str, &str),
        models: impl IntoIterator<Item = (String, String)>,
    ) -> anyhow::Result<Self> {
        let key = super::require(credentials, required_keys[0])?;
        let url = super::endpoint(&super::base_url(credentials, base_key, default_base)?, "chat/completions");

        let adapter = Self::new(name, required_keys, context, Auth::Bearer(SecretString::from(key)));
        Ok(models
            .into_iter()
            .fold(adapter, |adapter, (public, vendor)| adapter.route(public, vendor, url.clone())))
    }

    /// Use `max_completion_tokens` for the output budget
    #[must_use]
    pub const fn with_token_field(mut self, token_field: TokenField) -> Self {
        self.token_field = token_field;
        self
    }

    fn target(&self, model: &str) -> Result<&Route, LlmError> {
        self.routes
            .iter()
            .find(|route| route.public == model)
            .ok_or_else(|| LlmError::UnsupportedModel {
                model: model.to_owned(),
            })
    }

    fn post(&self, url: &str, body: &OpenAiChatRequest) -> RequestBuilder {
        let request = self.context.client.post(url).json(body);
        match &self.auth {
            Auth::Bearer(key) => request.bearer_auth(key.expose_secret()),
            Auth::ApiKeyHeader(key) => request.header("api-key", key.expose_secret()),
            Auth::None => request,
        }
    }

    fn prepare(&self, req: &ChatRequest) -> Result<(&Route, OpenAiChatRequest), LlmError> {
        crate::convert::check_parts(&req.messages, convert::ACCEPTED_PARTS)?;
        let route = self.target(&req.model)?;
        let body = convert::request(req, &route.vendor_model, self.token_field);
        Ok((route, body))
    }
}

pub(super) fn same_ids(ids: &[&str]) -> impl Iterator<Item = (String, String)> {
    ids.iter().map(|id| ((*id).to_owned(), (*id).to_owned()))
}

fn prefixed(prefix: &str, ids: impl IntoIterator<Item = String>) -> Vec<(String, String)> {
    ids.into_iter().map(|id| (format!("{prefix}/{id}"), id)).collect()
}

/// `DeepSeek`
pub fn deepseek(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    OpenAiCompatAdapter::hosted(
        "deepseek",
        DEEPSEEK_KEYS,
        credentials,
        context,
        ("DEEPSEEK_BASE_URL", "https://api.deepseek.com"),
        same_ids(DEEPSEEK_MODELS),
    )
}

/// Moonshot
pub fn moonshot(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    OpenAiCompatAdapter::hosted(
        "moonshot",
        MOONSHOT_KEYS,
        credentials,
        context,
        ("MOONSHOT_BASE_URL", "https://api.moonshot.cn/v1"),
        same_ids(MOONSHOT_MODELS),
    )
}

/// 01.AI
pub fn lingyiwanwu(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    OpenAiCompatAdapter::hosted(
        "lingyiwanwu",
        LINGYIWANWU_KEYS,
        credentials,
        context,
        ("LINGYIWANWU_BASE_URL", "https://api.lingyiwanwu.com/v1"),
        same_ids(LINGYIWANWU_MODELS),
    )
}

/// Groq, models exposed as `groq/<model>`
pub fn groq(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    OpenAiCompatAdapter::hosted(
        "groq",
        GROQ_KEYS,
        credentials,
        context,
        ("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
        prefixed("groq", super::model_ids(GROQ_MODELS)),
    )
}

/// Azure `OpenAI` deployments
///
/// `AZURE_DEPLOYMENT_MODELS` lists `model:deployment` pairs (a bare `model`
/// uses itself as deployment name); each is exposed as `azure/<model>`.
pub fn azure(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    let key = super::require(credentials, "AZURE_OPENAI_API_KEY")?;
    let endpoint = super::base_url(credentials, "AZURE_OPENAI_ENDPOINT", "")?;
    let version = super::require(credentials, "AZURE_API_VERSION")?;
    let deployments = super::csv(super::require(credentials, "AZURE_DEPLOYMENT_MODELS")?);

    let adapter = OpenAiCompatAdapter::new("azure", AZURE_KEYS, context, Auth::ApiKeyHeader(SecretString::from(key)));
    Ok(deployments.into_iter().fold(adapter, |adapter, entry| {
        let (model, deployment) = entry
            .split_once(':')
            .map_or((entry.as_str(), entry.as_str()), |(m, d)| (m.trim(), d.trim()));
        let url = format!(
            "{}?api-version={version}",
            super::endpoint(&endpoint, &format!("openai/deployments/{deployment}/chat/completions"))
        );
        adapter.route(format!("azure/{model}"), deployment, url)
    }))
}

/// Aliyun Bailian, models from `ALIYUN_BAILIAN_MODELS`
pub fn bailian(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    let models = credentials
        .get("ALIYUN_BAILIAN_MODELS")
        .map_or_else(|| vec![BAILIAN_DEFAULT_MODEL.to_owned()], super::csv);

    OpenAiCompatAdapter::hosted(
        "bailian",
        BAILIAN_KEYS,
        credentials,
        context,
        (
            "ALIYUN_BAILIAN_BASE_URL",
            "https://dashscope.aliyuncs.com/compatible-mode/v1",
        ),
        models.into_iter().map(|id| (id.clone(), id)),
    )
}

/// A local Ollama server, models from `OLLAMA_MODELS` exposed as `ollama/<model>`
pub fn ollama(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    let base = super::base_url(credentials, "OLLAMA_BASE_URL", "")?;
    let url = super::endpoint(&base, "v1/chat/completions");
    let models = credentials.get("OLLAMA_MODELS").map(super::csv).unwrap_or_default();

    let adapter = OpenAiCompatAdapter::new("ollama", OLLAMA_KEYS, context, Auth::None);
    Ok(prefixed("ollama", models)
        .into_iter()
        .fold(adapter, |adapter, (public, vendor)| adapter.route(public, vendor, url.clone())))
}

/// xAI Grok
pub fn grok(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    OpenAiCompatAdapter::hosted(
        "grok",
        GROK_KEYS,
        credentials,
        context,
        ("GROK_BASE_URL", "https://api.x.ai/v1"),
        same_ids(GROK_MODELS),
    )
}

/// `OpenRouter`, models from `OPENROUTER_MODELS`
pub fn openrouter(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    let models = credentials
        .get("OPENROUTER_MODELS")
        .map_or_else(|| super::model_ids(OPENROUTER_DEFAULT_MODELS), super::csv);

    OpenAiCompatAdapter::hosted(
        "openrouter",
        OPENROUTER_KEYS,
        credentials,
        context,
        ("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
        models.into_iter().map(|id| (id.clone(), id)),
    )
}

/// Cerebras
pub fn cerebras(credentials: &Credentials, context: &AdapterContext) -> anyhow::Result<OpenAiCompatAdapter> {
    OpenAiCompatAdapter::hosted(
        "cerebras",
        CEREBRAS_KEYS,
        credentials,
        context,
        ("CEREBRAS_BASE_URL", "https://api.cerebras.ai/v1"),
        CEREBRAS_MODELS
            .iter()
            .map(|(public, vendor)| ((*public).to_owned(), (*vendor).to_owned())),
    )
}

#[async_trait]
impl Adapter for OpenAiCompatAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn required_keys(&self) -> &'static [&'static str] {
        self.required_keys
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let (route, mut body) = self.prepare(request)?;
        body.stream = false;
        body.stream_options = None;

        tracing::debug!(vendor = self.name, model = %route.vendor_model, "sending chat completion");
        let response = super::send(self.name, self.post(&route.url, &body)).await?;
        let response: OpenAiResponse = super::read_json(self.name, response).await?;

        convert::response(response, &request.model)
    }

    async fn stream(&self, request: &ChatRequest, cancel: CancellationToken) -> Result<ChunkStream, LlmError> {
        let (route, mut body) = self.prepare(request)?;
        body.stream = true;
        body.stream_options = request
            .include_usage()
            .then_some(StreamOptions { include_usage: true });

        tracing::debug!(vendor = self.name, model = %route.vendor_model, "opening chat completion stream");
        let response = super::send(self.name, self.post(&route.url, &body)).await?;

        Ok(super::chunk_stream(
            sse_events(response, OpenAiDecoder::new()),
            request,
            cancel,
            &self.context,
        ))
    }
}
