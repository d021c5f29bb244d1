use serde::{Deserialize, Serialize};

use super::message::Role;
use super::response::{FinishReason, Usage};

/// One frame of a streamed chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Stream identifier, identical across all chunks of a stream
    pub id: String,
    /// Object type (`chat.completion.chunk`)
    pub object: String,
    /// Unix timestamp of the stream start
    pub created: u64,
    /// Model that served the request
    pub model: String,
    /// Choice deltas; empty on the usage frame
    pub choices: Vec<ChunkChoice>,
    /// Aggregate usage, only on the terminal accounting frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatChunk {
    /// Object tag for stream frames
    pub const OBJECT: &str = "chat.completion.chunk";

    /// Finish reason carried by this chunk, if any
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.iter().find_map(|c| c.finish_reason)
    }

    /// Concatenated content deltas of this chunk
    pub fn content(&self) -> String {
        self.choices.iter().filter_map(|c| c.delta.content.as_deref()).collect()
    }
}

/// Choice delta within a chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    pub index: u32,
    /// Incremental update
    pub delta: ChunkDelta,
    /// Finish reason; set on exactly one chunk per stream
    pub finish_reason: Option<FinishReason>,
}

/// Incremental update within a choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, present on the first chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool call fragments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Fragment of a tool call within a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Index of this tool call in the `tool_calls` array
    pub index: u32,
    /// Tool call ID (first fragment only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool type (first fragment only)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub call_type: Option<String>,
    /// Partial function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

impl ToolCallDelta {
    /// Opening fragment: id and function name
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            call_type: Some(super::message::function_type()),
            function: Some(FunctionCallDelta {
                name: Some(name.into()),
                arguments: Some(String::new()),
            }),
        }
    }

    /// Continuation fragment carrying argument text
    pub fn arguments(index: u32, arguments: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            call_type: None,
            function: Some(FunctionCallDelta {
                name: None,
                arguments: Some(arguments.into()),
            }),
        }
    }
}

/// Partial function call within a tool call fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    /// Function name (first fragment only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Incremental arguments JSON fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
