//! Ollama chat API shapes served to Ollama clients

use serde::Serialize;

use crate::types::FinishReason;

/// One `/api/chat` reply line, or the whole non-streaming reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaChatResponse {
    /// Model that served the request
    pub model: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// Assistant message or message fragment
    pub message: OllamaMessage,
    /// Why generation stopped, on the final line only
    pub done_reason: Option<FinishReason>,
    /// Whether this is the final line
    pub done: bool,
    /// Prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
    /// Completion tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
}

/// Assistant message in Ollama form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaMessage {
    /// Always `assistant`
    pub role: &'static str,
    /// Text content
    pub content: String,
    /// Complete tool calls
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OllamaToolCall>,
}

/// Tool call with parsed arguments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaToolCall {
    /// Called function
    pub function: OllamaFunctionCall,
}

/// Function name and arguments object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaFunctionCall {
    /// Function name
    pub name: String,
    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// `/api/tags` response
#[derive(Debug, Clone, Serialize)]
pub struct OllamaModelList {
    /// Available models
    pub models: Vec<OllamaModel>,
}

/// One model in the tag listing
#[derive(Debug, Clone, Serialize)]
pub struct OllamaModel {
    /// Model identifier
    pub name: String,
    /// Model identifier, repeated
    pub model: String,
    /// RFC 3339 time of the listing
    pub modified_at: String,
    /// Model details; always empty
    pub details: serde_json::Map<String, serde_json::Value>,
}
