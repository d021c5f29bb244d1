//! Conversion between canonical types and the Cohere v1 chat API

use crate::error::LlmError;
use crate::protocol::cohere::{CohereHistoryMessage, CohereRequest, CohereResponse, CohereStreamEvent};
use crate::stream::{FrameDecoder, VendorEvent};
use crate::types::{ChatRequest, ChatResponse, Choice, ChoiceMessage, FinishReason, Message, Role, Usage};

/// Part kinds Cohere accepts
pub const ACCEPTED_PARTS: &[&str] = &["text"];

/// Map a Cohere finish reason onto the canonical set
pub fn finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("ERROR_TOXIC") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

const fn history_role(role: Role) -> &'static str {
    match role {
        Role::System => "SYSTEM",
        Role::User => "USER",
        Role::Assistant => "CHATBOT",
        Role::Tool => "TOOL",
    }
}

// -- Request --

/// Build a chat request
///
/// The last user turn becomes `message`, everything before it the history.
pub fn request(req: &ChatRequest, vendor_model: &str) -> Result<CohereRequest, LlmError> {
    if req.tools.is_some() {
        tracing::debug!(model = %req.model, "tool declarations are not forwarded to cohere");
    }

    let turns: Vec<&Message> = req.messages.iter().filter(|m| m.role != Role::System).collect();
    let (last, history) = turns
        .split_last()
        .ok_or_else(|| LlmError::InvalidRequest("at least one non-system message is required".to_owned()))?;

    if last.content.is_none() {
        return Err(LlmError::InvalidRequest("content is required".to_owned()));
    }

    Ok(CohereRequest {
        model: vendor_model.to_owned(),
        message: last.text_content(),
        chat_history: history
            .iter()
            .map(|message| CohereHistoryMessage {
                role: history_role(message.role),
                message: message.text_content(),
            })
            .collect(),
        preamble: super::hoisted_system(&req.messages),
        temperature: req.temperature,
        top_p: req.top_p,
        max_tokens: super::max_tokens(req, vendor_model),
        stop_sequences: req.stop_sequences(),
        frequency_penalty: req.frequency_penalty,
        presence_penalty: req.presence_penalty,
        seed: req.seed,
        stream: req.stream,
    })
}

// -- Response --

/// Translate a complete chat response
pub fn response(resp: CohereResponse, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let (input, output) = resp.billed_tokens();
    let (prompt, completion) = LlmError::require_usage(input, output)?;

    Ok(ChatResponse {
        id: resp.generation_id.unwrap_or_else(super::completion_id),
        object: ChatResponse::OBJECT.to_owned(),
        created: crate::types::unix_now(),
        model: requested_model.to_owned(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage::assistant(resp.text, Vec::new()),
            finish_reason: finish_reason(resp.finish_reason.as_deref()),
        }],
        usage: Usage::new(prompt, completion),
    })
}

// -- Stream --

/// Decodes the newline-delimited JSON events of a chat stream
///
/// Billed units arrive only with `stream-end`; a stream ending without them
/// fails even when the caller did not ask for usage.
#[derive(Debug, Default)]
pub struct CohereDecoder;

impl CohereDecoder {
    /// Decoder for a fresh stream
    pub const fn new() -> Self {
        Self
    }
}

impl FrameDecoder for CohereDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<VendorEvent>, LlmError> {
        let event = match serde_json::from_str::<CohereStreamEvent>(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, data, "skipping unparseable cohere event");
                return Ok(Vec::new());
            }
        };

        let events = match event {
            CohereStreamEvent::StreamStart { generation_id } => vec![VendorEvent::Started {
                id: generation_id,
                model: None,
            }],
            CohereStreamEvent::TextGeneration { text } => vec![VendorEvent::Content { index: 0, text }],
            CohereStreamEvent::StreamEnd {
                finish_reason: reason,
                response,
            } => {
                let (input, output) = response.billed_tokens();
                LlmError::require_usage(input, output)?;
                vec![
                    VendorEvent::Usage {
                        prompt_tokens: input,
                        completion_tokens: output,
                    },
                    VendorEvent::Finished {
                        index: 0,
                        reason: finish_reason(reason.as_deref().or(response.finish_reason.as_deref())),
                    },
                ]
            }
            CohereStreamEvent::Other => Vec::new(),
        };

        Ok(events)
    }
}
