//! `OpenAI` chat completion and Responses API wire format types

use serde::{Deserialize, Serialize};

use crate::types::{Message, StreamOptions, ToolCall, ToolChoice, ToolDefinition};

// -- Chat completions: request --

/// Chat completion request sent to an `OpenAI`-compatible vendor
///
/// Messages already use the `OpenAI` shape, so they are forwarded as-is.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiChatRequest {
    /// Vendor-side model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Token budget (legacy field name, used by compatible vendors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Token budget (current field name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Frequency penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Random seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// End-user identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Whether to stream the response
    pub stream: bool,
    /// Stream options, only sent when usage is requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Caller fields passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// -- Chat completions: response --

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    /// Response identifier
    #[serde(default)]
    pub id: String,
    /// Creation timestamp
    #[serde(default)]
    pub created: u64,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Generated choices
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

/// Choice within a chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Generated message
    pub message: OpenAiChoiceMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message within a response choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoiceMessage {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Token usage; counters are optional so omissions can be detected
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: Option<u32>,
}

// -- Chat completions: streaming --

/// Streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Chunk identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Delta choices
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Usage (final chunk when `stream_options.include_usage` is set)
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Incremental delta
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Finish reason (final chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content within a streaming choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Incremental text content
    #[serde(default)]
    pub content: Option<String>,
    /// Incremental tool calls
    #[serde(default)]
    pub tool_calls: Option<Vec<crate::types::ToolCallDelta>>,
}

// -- Responses API: request --

/// Responses API request
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    /// Model identifier
    pub model: String,
    /// Conversation items
    pub input: Vec<ResponsesInputItem>,
    /// System instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Token budget
    pub max_output_tokens: u32,
    /// Function tools
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ResponsesTool>,
    /// Tool choice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Whether to stream the response
    pub stream: bool,
    /// Do not persist the response on the vendor side
    pub store: bool,
}

/// Item of the Responses API `input` array
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesInputItem {
    /// A conversational message
    Message {
        /// "user", "assistant", or "system"
        role: &'static str,
        /// Content parts
        content: Vec<ResponsesContent>,
    },
    /// A function call previously made by the assistant
    FunctionCall {
        /// Call identifier
        call_id: String,
        /// Function name
        name: String,
        /// JSON-encoded arguments
        arguments: String,
    },
    /// Result of a function call
    FunctionCallOutput {
        /// Call identifier
        call_id: String,
        /// Tool output
        output: String,
    },
}

/// Content part within a Responses API message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesContent {
    /// Text sent by the user or system
    InputText {
        /// The text
        text: String,
    },
    /// Image sent by the user
    InputImage {
        /// URL or data URI
        image_url: String,
        /// Detail level
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// File sent by the user
    InputFile {
        /// Vendor-side file id
        #[serde(skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
        /// Inline data URI
        #[serde(skip_serializing_if = "Option::is_none")]
        file_data: Option<String>,
        /// File name
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// Text previously produced by the assistant
    OutputText {
        /// The text
        text: String,
    },
}

/// Function tool in the Responses API (flattened)
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function name
    pub name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

// -- Responses API: response --

/// Responses API response object
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesResponse {
    /// Response identifier
    #[serde(default)]
    pub id: String,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<u64>,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// `completed`, `incomplete`, `failed`, ...
    #[serde(default)]
    pub status: Option<String>,
    /// Why the response is incomplete
    #[serde(default)]
    pub incomplete_details: Option<ResponsesIncompleteDetails>,
    /// Failure details
    #[serde(default)]
    pub error: Option<ResponsesError>,
    /// Output items
    #[serde(default)]
    pub output: Vec<ResponsesOutputItem>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<ResponsesUsage>,
}

/// Reason for an incomplete response
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesIncompleteDetails {
    /// `max_output_tokens` or `content_filter`
    #[serde(default)]
    pub reason: Option<String>,
}

/// Error object of a failed response
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesError {
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Output item of a response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputItem {
    /// Assistant message
    Message {
        /// Content parts
        #[serde(default)]
        content: Vec<ResponsesOutputContent>,
    },
    /// Function call
    FunctionCall {
        /// Call identifier
        call_id: String,
        /// Function name
        name: String,
        /// JSON-encoded arguments
        #[serde(default)]
        arguments: String,
    },
    /// Reasoning summaries and other items that carry no output text
    #[serde(other)]
    Other,
}

/// Content part of an output message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputContent {
    /// Generated text
    OutputText {
        /// The text
        text: String,
    },
    /// Refusal message
    Refusal {
        /// The refusal text
        refusal: String,
    },
    /// Anything else
    #[serde(other)]
    Other,
}

/// Responses API token usage
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesUsage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: Option<u32>,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: Option<u32>,
}

// -- Responses API: streaming --

/// Responses API stream event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    /// Response created
    #[serde(rename = "response.created")]
    Created {
        /// Initial response object
        response: ResponsesResponse,
    },
    /// A new output item started
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Position in the `output` array
        output_index: u32,
        /// The item
        item: ResponsesOutputItem,
    },
    /// Text fragment
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Text fragment
        delta: String,
    },
    /// Refusal fragment
    #[serde(rename = "response.refusal.delta")]
    RefusalDelta {
        /// Refusal fragment
        delta: String,
    },
    /// Function call argument fragment
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Position in the `output` array
        output_index: u32,
        /// Arguments fragment
        delta: String,
    },
    /// Response completed
    #[serde(rename = "response.completed")]
    Completed {
        /// Final response object
        response: ResponsesResponse,
    },
    /// Response stopped early
    #[serde(rename = "response.incomplete")]
    Incomplete {
        /// Final response object
        response: ResponsesResponse,
    },
    /// Response failed
    #[serde(rename = "response.failed")]
    Failed {
        /// Final response object
        response: ResponsesResponse,
    },
    /// Stream-level error
    #[serde(rename = "error")]
    Error {
        /// Error message
        #[serde(default)]
        message: String,
    },
    /// Events that carry nothing the gateway forwards
    #[serde(other)]
    Other,
}
