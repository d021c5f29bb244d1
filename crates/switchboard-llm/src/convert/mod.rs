//! Translation between the canonical contract and vendor wire formats
//!
//! Each submodule handles one vendor protocol: request translation,
//! response translation, and a [`FrameDecoder`](crate::stream::FrameDecoder)
//! that normalises stream frames into vendor events.

pub mod anthropic;
pub mod cohere;
pub mod google;
pub mod ollama;
pub mod openai;
pub mod responses;

use crate::error::LlmError;
use crate::types::{ChatRequest, Content, ContentPart, Message, Role};

/// Output budgets applied when the caller sets none, first prefix match wins
const MAX_TOKEN_DEFAULTS: &[(&str, u32)] = &[
    ("claude-3-", 4096),
    ("claude-", 8192),
    ("gpt-3.5", 4096),
    ("gpt-4o", 16384),
    ("gpt-4.1", 32768),
    ("gpt-4", 4096),
    ("gpt-5", 32768),
    ("o1", 65536),
    ("o3", 65536),
    ("o4", 65536),
    ("gemini-", 8192),
    ("command", 4000),
    ("deepseek-", 8192),
];

/// Budget for model families missing from the table
const FALLBACK_MAX_TOKENS: u32 = 4096;

/// Default output budget for `model`
///
/// Matches on the vendor-side model id with any `vendor/` routing prefix
/// removed.
pub fn default_max_tokens(model: &str) -> u32 {
    let bare = model.rsplit('/').next().unwrap_or(model);
    MAX_TOKEN_DEFAULTS
        .iter()
        .find(|(prefix, _)| bare.starts_with(prefix))
        .map_or(FALLBACK_MAX_TOKENS, |(_, tokens)| *tokens)
}

/// Caller budget or the model family default
pub fn max_tokens(req: &ChatRequest, vendor_model: &str) -> u32 {
    req.max_output_tokens()
        .unwrap_or_else(|| default_max_tokens(vendor_model))
}

/// Identifier for a tool call the vendor returned without one
pub fn synthesized_call_id(position: usize) -> String {
    format!("call_{position}")
}

/// Parse tool call arguments, tolerating malformed JSON from earlier turns
pub fn parse_arguments(arguments: &str) -> serde_json::Value {
    if arguments.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(arguments).unwrap_or_else(|_| serde_json::json!({}))
}

/// Fresh completion identifier
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// Reject part kinds that cannot be translated, before any network call
///
/// `accepted` lists the part kinds the target vendor understands.
pub fn check_parts(messages: &[Message], accepted: &[&str]) -> Result<(), LlmError> {
    let unsupported = messages
        .iter()
        .filter_map(|message| match &message.content {
            Some(Content::Parts(parts)) => Some(parts),
            _ => None,
        })
        .flatten()
        .find(|part| !accepted.contains(&part.kind()));

    match unsupported {
        Some(part) => Err(LlmError::UnsupportedContentType {
            kind: part.kind().to_owned(),
        }),
        None => Ok(()),
    }
}

/// Image references of user turns, in message and part order
///
/// Request builders embed images from user turns only and consume the result
/// in this order.
pub fn user_image_references(messages: &[Message]) -> Vec<&str> {
    messages
        .iter()
        .filter(|message| message.role == Role::User)
        .filter_map(|message| match &message.content {
            Some(Content::Parts(parts)) => Some(parts),
            _ => None,
        })
        .flatten()
        .filter_map(|part| match part {
            ContentPart::ImageUrl { image_url } => Some(image_url.url.as_str()),
            _ => None,
        })
        .collect()
}

/// System messages joined by newlines, `None` when there are none
pub fn hoisted_system(messages: &[Message]) -> Option<String> {
    let system: Vec<String> = messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(Message::text_content)
        .collect();

    (!system.is_empty()).then(|| system.join("\n"))
}

/// Name of the function called by the assistant with the given call id
pub fn tool_name_for<'a>(messages: &'a [Message], call_id: &str) -> Option<&'a str> {
    messages
        .iter()
        .filter_map(|message| message.tool_calls.as_ref())
        .flatten()
        .find(|call| call.id == call_id)
        .map(|call| call.function.name.as_str())
}
