//! Conversion between canonical types and the `OpenAI` Responses API

use std::collections::HashMap;

use crate::error::LlmError;
use crate::protocol::openai::{
    ResponsesContent, ResponsesInputItem, ResponsesOutputContent, ResponsesOutputItem, ResponsesRequest,
    ResponsesResponse, ResponsesStreamEvent, ResponsesTool,
};
use crate::stream::{FrameDecoder, VendorEvent};
use crate::types::{
    ChatRequest, ChatResponse, Choice, ChoiceMessage, Content, ContentPart, FinishReason, Message, Role, ToolCall,
    ToolCallDelta, ToolPolicy, Usage,
};

/// Part kinds the Responses API accepts
pub const ACCEPTED_PARTS: &[&str] = &["text", "image_url", "file"];

/// Finish reason of a finished response object
pub fn finish_reason(resp: &ResponsesResponse, called_tools: bool) -> FinishReason {
    let incomplete = resp
        .incomplete_details
        .as_ref()
        .and_then(|details| details.reason.as_deref());

    match (resp.status.as_deref(), incomplete) {
        (Some("incomplete"), Some("max_output_tokens")) => FinishReason::Length,
        (Some("incomplete"), Some("content_filter")) => FinishReason::ContentFilter,
        _ if called_tools => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

// -- Request --

/// Build a Responses API request
pub fn request(req: &ChatRequest, vendor_model: &str) -> Result<ResponsesRequest, LlmError> {
    let mut input = Vec::new();

    for message in &req.messages {
        match message.role {
            Role::System => {}
            Role::User => input.push(ResponsesInputItem::Message {
                role: "user",
                content: user_content(message)?,
            }),
            Role::Assistant => {
                let text = message.text_content();
                if !text.is_empty() {
                    input.push(ResponsesInputItem::Message {
                        role: "assistant",
                        content: vec![ResponsesContent::OutputText { text }],
                    });
                }
                for call in message.tool_calls.iter().flatten() {
                    input.push(ResponsesInputItem::FunctionCall {
                        call_id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    });
                }
            }
            Role::Tool => input.push(ResponsesInputItem::FunctionCallOutput {
                call_id: message
                    .tool_call_id
                    .clone()
                    .ok_or_else(|| LlmError::InvalidRequest("tool messages require tool_call_id".to_owned()))?,
                output: message.text_content(),
            }),
        }
    }

    let tools = req
        .tools
        .iter()
        .flatten()
        .map(|tool| ResponsesTool {
            tool_type: "function",
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            parameters: tool.function.schema(),
        })
        .collect();

    let tool_choice = req.tool_choice.as_ref().and_then(|choice| match choice.policy() {
        ToolPolicy::Auto => Some(serde_json::json!("auto")),
        ToolPolicy::Required => Some(serde_json::json!("required")),
        ToolPolicy::None => None,
        ToolPolicy::Named(name) => Some(serde_json::json!({"type": "function", "name": name})),
    });

    Ok(ResponsesRequest {
        model: vendor_model.to_owned(),
        input,
        instructions: super::hoisted_system(&req.messages),
        temperature: req.temperature,
        top_p: req.top_p,
        max_output_tokens: super::max_tokens(req, vendor_model),
        tools,
        tool_choice,
        stream: req.stream,
        store: false,
    })
}

fn user_content(message: &Message) -> Result<Vec<ResponsesContent>, LlmError> {
    let content = message
        .content
        .as_ref()
        .ok_or_else(|| LlmError::InvalidRequest("content is required".to_owned()))?;

    match content {
        Content::Text(text) => Ok(vec![ResponsesContent::InputText { text: text.clone() }]),
        Content::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => Ok(ResponsesContent::InputText { text: text.clone() }),
                ContentPart::ImageUrl { image_url } => Ok(ResponsesContent::InputImage {
                    image_url: image_url.url.clone(),
                    detail: Some(image_url.detail.clone().unwrap_or_else(|| "auto".to_owned())),
                }),
                ContentPart::File { file } => Ok(ResponsesContent::InputFile {
                    file_id: file.file_id.clone(),
                    file_data: file.file_data.clone(),
                    filename: file.filename.clone(),
                }),
                ContentPart::Unsupported { kind } => Err(LlmError::UnsupportedContentType { kind: kind.clone() }),
            })
            .collect(),
    }
}

// -- Response --

/// Translate a finished response object
pub fn response(resp: ResponsesResponse, requested_model: &str) -> Result<ChatResponse, LlmError> {
    if resp.status.as_deref() == Some("failed") {
        let message = resp
            .error
            .map_or_else(|| "response failed".to_owned(), |error| error.message);
        return Err(LlmError::upstream(message));
    }

    let usage = resp.usage.as_ref();
    let (prompt, completion) = LlmError::require_usage(
        usage.and_then(|u| u.input_tokens),
        usage.and_then(|u| u.output_tokens),
    )?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for item in &resp.output {
        match item {
            ResponsesOutputItem::Message { content } => {
                for part in content {
                    match part {
                        ResponsesOutputContent::OutputText { text: fragment } => text.push_str(fragment),
                        ResponsesOutputContent::Refusal { refusal } => text.push_str(refusal),
                        ResponsesOutputContent::Other => {}
                    }
                }
            }
            ResponsesOutputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => tool_calls.push(ToolCall::function(call_id.clone(), name.clone(), arguments.clone())),
            ResponsesOutputItem::Other => {}
        }
    }

    let reason = finish_reason(&resp, !tool_calls.is_empty());

    Ok(ChatResponse {
        id: if resp.id.is_empty() { super::completion_id() } else { resp.id },
        object: ChatResponse::OBJECT.to_owned(),
        created: resp.created_at.unwrap_or_else(crate::types::unix_now),
        model: if resp.model.is_empty() {
            requested_model.to_owned()
        } else {
            resp.model
        },
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage::assistant(text, tool_calls),
            finish_reason: reason,
        }],
        usage: Usage::new(prompt, completion),
    })
}

// -- Stream --

/// Decodes semantic Responses API stream events
///
/// Function calls are identified by their position in the `output` array;
/// they are renumbered into sequential tool call indices.
#[derive(Debug, Default)]
pub struct ResponsesDecoder {
    tool_indices: HashMap<u32, u32>,
}

impl ResponsesDecoder {
    /// Decoder for a fresh stream
    pub fn new() -> Self {
        Self::default()
    }

    fn convert(&mut self, event: ResponsesStreamEvent) -> Result<Vec<VendorEvent>, LlmError> {
        let events = match event {
            ResponsesStreamEvent::Created { response } => vec![VendorEvent::Started {
                id: Some(response.id).filter(|id| !id.is_empty()),
                model: Some(response.model).filter(|model| !model.is_empty()),
            }],
            ResponsesStreamEvent::OutputTextDelta { delta } | ResponsesStreamEvent::RefusalDelta { delta } => {
                vec![VendorEvent::Content { index: 0, text: delta }]
            }
            ResponsesStreamEvent::OutputItemAdded {
                output_index,
                item: ResponsesOutputItem::FunctionCall { call_id, name, .. },
            } => {
                let index = u32::try_from(self.tool_indices.len()).unwrap_or(u32::MAX);
                self.tool_indices.insert(output_index, index);
                vec![VendorEvent::ToolCall {
                    index: 0,
                    call: ToolCallDelta::start(index, call_id, name),
                }]
            }
            ResponsesStreamEvent::FunctionCallArgumentsDelta { output_index, delta } => {
                match self.tool_indices.get(&output_index) {
                    Some(index) => vec![VendorEvent::ToolCall {
                        index: 0,
                        call: ToolCallDelta::arguments(*index, delta),
                    }],
                    None => Vec::new(),
                }
            }
            ResponsesStreamEvent::Completed { response } | ResponsesStreamEvent::Incomplete { response } => {
                let usage = response.usage.as_ref();
                vec![
                    VendorEvent::Usage {
                        prompt_tokens: usage.and_then(|u| u.input_tokens),
                        completion_tokens: usage.and_then(|u| u.output_tokens),
                    },
                    VendorEvent::Finished {
                        index: 0,
                        reason: finish_reason(&response, !self.tool_indices.is_empty()),
                    },
                ]
            }
            ResponsesStreamEvent::Failed { response } => {
                let message = response
                    .error
                    .map_or_else(|| "response failed".to_owned(), |error| error.message);
                return Err(LlmError::upstream(message));
            }
            ResponsesStreamEvent::Error { message } => return Err(LlmError::upstream(message)),
            ResponsesStreamEvent::OutputItemAdded { .. } | ResponsesStreamEvent::Other => Vec::new(),
        };

        Ok(events)
    }
}

impl FrameDecoder for ResponsesDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<VendorEvent>, LlmError> {
        match serde_json::from_str::<ResponsesStreamEvent>(data) {
            Ok(event) => self.convert(event),
            Err(e) => {
                tracing::debug!(error = %e, data, "skipping unparseable responses event");
                Ok(Vec::new())
            }
        }
    }
}
