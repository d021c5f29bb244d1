//! Cohere v1 chat API wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Cohere chat request
#[derive(Debug, Clone, Serialize)]
pub struct CohereRequest {
    /// Model identifier
    pub model: String,
    /// Latest user message
    pub message: String,
    /// Earlier turns, oldest first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<CohereHistoryMessage>,
    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(rename = "p", skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Frequency penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Random seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Whether to stream the response
    pub stream: bool,
}

/// Turn in the chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohereHistoryMessage {
    /// `USER`, `CHATBOT`, `SYSTEM`, or `TOOL`
    pub role: &'static str,
    /// Message text
    pub message: String,
}

// -- Response types --

/// Cohere chat response; also the `response` of a `stream-end` event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CohereResponse {
    /// Generated text
    #[serde(default)]
    pub text: String,
    /// Generation identifier
    #[serde(default)]
    pub generation_id: Option<String>,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Billing metadata
    #[serde(default)]
    pub meta: Option<CohereMeta>,
}

impl CohereResponse {
    /// Billed input and output tokens, as far as reported
    pub fn billed_tokens(&self) -> (Option<u32>, Option<u32>) {
        self.meta
            .as_ref()
            .and_then(|meta| meta.billed_units.as_ref())
            .map_or((None, None), |units| (units.input_tokens, units.output_tokens))
    }
}

/// Response metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CohereMeta {
    /// Units billed for this call
    #[serde(default)]
    pub billed_units: Option<CohereBilledUnits>,
}

/// Billed token counts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CohereBilledUnits {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: Option<u32>,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: Option<u32>,
}

// -- Streaming types --

/// One line of the newline-delimited JSON stream
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event_type", rename_all = "kebab-case")]
pub enum CohereStreamEvent {
    /// Stream opened
    StreamStart {
        /// Generation identifier
        #[serde(default)]
        generation_id: Option<String>,
    },
    /// Text fragment
    TextGeneration {
        /// Fragment
        text: String,
    },
    /// Stream finished
    StreamEnd {
        /// Why generation stopped
        #[serde(default)]
        finish_reason: Option<String>,
        /// Aggregated response including billing metadata
        #[serde(default)]
        response: CohereResponse,
    },
    /// Citations, search results and other events with no canonical counterpart
    #[serde(other)]
    Other,
}
