//! Canonical contract shared by every adapter
//!
//! These shapes follow the `OpenAI` chat completion API. Inbound requests
//! deserialize straight into them and every vendor response is translated
//! back into them.

pub mod chunk;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod tool;

pub use chunk::{ChatChunk, ChunkChoice, ChunkDelta, FunctionCallDelta, ToolCallDelta};
pub use message::{Content, ContentPart, FileRef, FunctionCall, ImageUrl, Message, Role, ToolCall};
pub use model::{ModelCard, ModelList};
pub use request::{ChatRequest, StopSequences, StreamOptions};
pub use response::{ChatResponse, Choice, ChoiceMessage, FinishReason, Usage};
pub use tool::{FunctionDefinition, FunctionName, NamedToolChoice, ToolChoice, ToolChoiceMode, ToolDefinition, ToolPolicy};

/// Seconds since the Unix epoch
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
