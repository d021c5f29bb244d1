//! Conversion between canonical types and the Anthropic Messages API

use crate::error::LlmError;
use crate::media::{self, InlineData};
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicResponseBlock,
    AnthropicSource, AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicTool,
    AnthropicToolChoice,
};
use crate::stream::{FrameDecoder, VendorEvent};
use crate::types::{
    ChatRequest, ChatResponse, Choice, ChoiceMessage, Content, ContentPart, FinishReason, Message, Role, ToolCall,
    ToolCallDelta, ToolPolicy, Usage,
};

/// Part kinds the Messages API accepts
pub const ACCEPTED_PARTS: &[&str] = &["text", "image_url", "file"];

/// Map an Anthropic stop reason onto the canonical set
pub fn finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        Some("refusal") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// -- Request --

/// Build a Messages API request
///
/// `images` holds the resolved image parts of the user turns of `req`, in
/// message order.
/// `model` is `None` for endpoints that carry the model in the URL.
pub fn request(
    req: &ChatRequest,
    model: Option<String>,
    vendor_model: &str,
    images: Vec<InlineData>,
) -> Result<AnthropicRequest, LlmError> {
    let mut images = images.into_iter();
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for message in &req.messages {
        let (role, blocks) = match message.role {
            Role::System => continue,
            Role::User => ("user", user_blocks(message, &mut images)?),
            Role::Assistant => ("assistant", assistant_blocks(message)?),
            Role::Tool => ("user", vec![tool_result(message)?]),
        };

        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(AnthropicMessage { role, content: blocks }),
        }
    }

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                input_schema: tool.function.schema(),
            })
            .collect()
    });

    let tool_choice = req.tool_choice.as_ref().and_then(|choice| match choice.policy() {
        ToolPolicy::Auto => Some(AnthropicToolChoice::Auto),
        ToolPolicy::Required => Some(AnthropicToolChoice::Any),
        ToolPolicy::None => None,
        ToolPolicy::Named(name) => Some(AnthropicToolChoice::Tool { name: name.to_owned() }),
    });

    Ok(AnthropicRequest {
        model,
        anthropic_version: None,
        max_tokens: super::max_tokens(req, vendor_model),
        system: super::hoisted_system(&req.messages),
        messages,
        temperature: req.temperature,
        top_p: req.top_p,
        stop_sequences: req.stop_sequences(),
        stream: req.stream,
        tools,
        tool_choice,
    })
}

fn user_blocks(
    message: &Message,
    images: &mut impl Iterator<Item = InlineData>,
) -> Result<Vec<AnthropicContentBlock>, LlmError> {
    let content = message
        .content
        .as_ref()
        .ok_or_else(|| LlmError::InvalidRequest("content is required".to_owned()))?;

    let parts = match content {
        Content::Text(text) => return Ok(vec![AnthropicContentBlock::Text { text: text.clone() }]),
        Content::Parts(parts) => parts,
    };

    parts
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => Ok(AnthropicContentBlock::Text { text: text.clone() }),
            ContentPart::ImageUrl { .. } => {
                let image = images
                    .next()
                    .ok_or_else(|| LlmError::Internal(anyhow::anyhow!("resolved images out of step with parts")))?;
                Ok(AnthropicContentBlock::Image { source: source(&image) })
            }
            ContentPart::File { file } => {
                let reference = file
                    .file_data
                    .as_deref()
                    .ok_or_else(|| LlmError::InvalidRequest("file parts require inline file_data".to_owned()))?;
                let document = media::decode_data_uri(reference)?
                    .ok_or_else(|| LlmError::malformed_reference(reference, "file_data must be a data URI"))?;
                Ok(AnthropicContentBlock::Document {
                    source: source(&document),
                })
            }
            ContentPart::Unsupported { kind } => Err(LlmError::UnsupportedContentType { kind: kind.clone() }),
        })
        .collect()
}

fn source(data: &InlineData) -> AnthropicSource {
    AnthropicSource {
        source_type: "base64",
        media_type: data.media_type.clone(),
        data: data.to_base64(),
    }
}

fn assistant_blocks(message: &Message) -> Result<Vec<AnthropicContentBlock>, LlmError> {
    let mut blocks = Vec::new();

    let text = message.text_content();
    if !text.is_empty() {
        blocks.push(AnthropicContentBlock::Text { text });
    }

    for call in message.tool_calls.iter().flatten() {
        blocks.push(AnthropicContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.function.name.clone(),
            input: super::parse_arguments(&call.function.arguments),
        });
    }

    if blocks.is_empty() {
        return Err(LlmError::InvalidRequest("content is required".to_owned()));
    }
    Ok(blocks)
}

fn tool_result(message: &Message) -> Result<AnthropicContentBlock, LlmError> {
    let tool_use_id = message
        .tool_call_id
        .clone()
        .ok_or_else(|| LlmError::InvalidRequest("tool messages require tool_call_id".to_owned()))?;

    Ok(AnthropicContentBlock::ToolResult {
        tool_use_id,
        content: message.text_content(),
    })
}

// -- Response --

/// Translate a complete Messages API response
pub fn response(resp: AnthropicResponse, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let (prompt, completion) = LlmError::require_usage(resp.usage.input_tokens, resp.usage.output_tokens)?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in resp.content {
        match block {
            AnthropicResponseBlock::Text { text: fragment } => text.push_str(&fragment),
            AnthropicResponseBlock::ToolUse { id, name, input } => {
                let id = if id.is_empty() {
                    super::synthesized_call_id(tool_calls.len())
                } else {
                    id
                };
                tool_calls.push(ToolCall::function(id, name, input.to_string()));
            }
            AnthropicResponseBlock::Other => {}
        }
    }

    Ok(ChatResponse {
        id: if resp.id.is_empty() { super::completion_id() } else { resp.id },
        object: ChatResponse::OBJECT.to_owned(),
        created: crate::types::unix_now(),
        model: if resp.model.is_empty() {
            requested_model.to_owned()
        } else {
            resp.model
        },
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage::assistant(text, tool_calls),
            finish_reason: finish_reason(resp.stop_reason.as_deref()),
        }],
        usage: Usage::new(prompt, completion),
    })
}

// -- Stream --

/// Decodes the start/delta/stop event triplets of a Messages API stream
///
/// Content block indices are shared between text and tool blocks, so tool
/// calls get their own sequential index.
#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    next_tool_index: u32,
    current_tool_index: Option<u32>,
}

impl AnthropicDecoder {
    /// Decoder for a fresh stream
    pub fn new() -> Self {
        Self::default()
    }

    fn convert(&mut self, event: AnthropicStreamEvent) -> Result<Vec<VendorEvent>, LlmError> {
        let events = match event {
            AnthropicStreamEvent::MessageStart { message } => {
                let mut events = vec![VendorEvent::Started {
                    id: message.id,
                    model: message.model,
                }];
                if let Some(usage) = message.usage {
                    events.push(VendorEvent::Usage {
                        prompt_tokens: usage.input_tokens,
                        completion_tokens: usage.output_tokens,
                    });
                }
                events
            }
            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                AnthropicStreamContentBlock::Text { text } => vec![VendorEvent::Content { index: 0, text }],
                AnthropicStreamContentBlock::ToolUse { id, name } => {
                    let index = self.next_tool_index;
                    self.next_tool_index += 1;
                    self.current_tool_index = Some(index);
                    vec![VendorEvent::ToolCall {
                        index: 0,
                        call: ToolCallDelta::start(index, id, name),
                    }]
                }
                AnthropicStreamContentBlock::Other => Vec::new(),
            },
            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                AnthropicStreamDelta::TextDelta { text } => vec![VendorEvent::Content { index: 0, text }],
                AnthropicStreamDelta::InputJsonDelta { partial_json } => match self.current_tool_index {
                    Some(index) if !partial_json.is_empty() => vec![VendorEvent::ToolCall {
                        index: 0,
                        call: ToolCallDelta::arguments(index, partial_json),
                    }],
                    _ => Vec::new(),
                },
                AnthropicStreamDelta::Other => Vec::new(),
            },
            AnthropicStreamEvent::ContentBlockStop { .. } => {
                self.current_tool_index = None;
                Vec::new()
            }
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();
                if let Some(usage) = usage {
                    events.push(VendorEvent::Usage {
                        prompt_tokens: usage.input_tokens,
                        completion_tokens: usage.output_tokens,
                    });
                }
                if let Some(reason) = delta.stop_reason {
                    events.push(VendorEvent::Finished {
                        index: 0,
                        reason: finish_reason(Some(&reason)),
                    });
                }
                events
            }
            AnthropicStreamEvent::MessageStop | AnthropicStreamEvent::Ping => Vec::new(),
            AnthropicStreamEvent::Error { error } => {
                return Err(LlmError::upstream(format!("{}: {}", error.error_type, error.message)));
            }
        };

        Ok(events)
    }
}

impl FrameDecoder for AnthropicDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<VendorEvent>, LlmError> {
        match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(event) => self.convert(event),
            Err(e) => {
                tracing::debug!(error = %e, data, "skipping unparseable anthropic event");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{ToolChoice, ToolDefinition};

    fn request_from(value: serde_json::Value) -> ChatRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn hoists_system_and_groups_tool_results() {
        let req = request_from(json!({
            "model": "claude-3-haiku-20240307",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "system", "content": "be kind"},
                {"role": "user", "content": "weather in Paris and Rome?"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "t1", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Paris\"}"}},
                    {"id": "t2", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Rome\"}"}}
                ]},
                {"role": "tool", "tool_call_id": "t1", "content": "sunny"},
                {"role": "tool", "tool_call_id": "t2", "content": "rain"}
            ],
            "stop": "END"
        }));

        let wire = request(&req, Some("claude-3-haiku-20240307".to_owned()), &req.model, Vec::new()).unwrap();
        let body = serde_json::to_value(&wire).unwrap();

        assert_eq!(body["system"], "be brief\nbe kind");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stop_sequences"], json!(["END"]));
        assert_eq!(wire.messages.len(), 3);
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(body["messages"][1]["content"][1]["input"], json!({"city": "Rome"}));
        assert_eq!(body["messages"][2]["role"], "user");
        assert_eq!(body["messages"][2]["content"][1]["tool_use_id"], "t2");
        assert!(body.get("anthropic_version").is_none());
    }

    #[test]
    fn images_are_embedded_in_part_order() {
        let req = request_from(json!({
            "model": "claude-sonnet-4-20250514",
            "messages": [{"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": "https://example.com/a.png"}},
                {"type": "text", "text": "compare"},
                {"type": "image_url", "image_url": {"url": "data:image/gif;base64,Z2lm"}}
            ]}],
            "max_completion_tokens": 77
        }));

        let images = vec![
            InlineData {
                media_type: "image/png".to_owned(),
                bytes: b"png".to_vec(),
            },
            InlineData {
                media_type: "image/gif".to_owned(),
                bytes: b"gif".to_vec(),
            },
        ];
        let body = serde_json::to_value(request(&req, None, &req.model, images).unwrap()).unwrap();
        let content = &body["messages"][0]["content"];

        assert_eq!(body["max_tokens"], 77);
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[0]["source"]["data"], "cG5n");
        assert_eq!(content[1]["text"], "compare");
        assert_eq!(content[2]["source"]["data"], "Z2lm");
    }

    #[test]
    fn tool_choice_none_keeps_tools_but_omits_choice() {
        let mut req = ChatRequest::new("claude-sonnet-4-20250514", vec![Message::text(Role::User, "hi")]);
        req.tools = Some(vec![
            serde_json::from_value::<ToolDefinition>(json!({
                "type": "function",
                "function": {"name": "lookup", "parameters": {"type": "object"}}
            }))
            .unwrap(),
        ]);

        req.tool_choice = Some(serde_json::from_value::<ToolChoice>(json!("none")).unwrap());
        let wire = request(&req, None, &req.model, Vec::new()).unwrap();
        assert!(wire.tool_choice.is_none());
        assert_eq!(wire.tools.as_ref().unwrap()[0].name, "lookup");

        req.tool_choice = Some(serde_json::from_value::<ToolChoice>(json!("required")).unwrap());
        let wire = request(&req, None, &req.model, Vec::new()).unwrap();
        assert_eq!(wire.tool_choice, Some(AnthropicToolChoice::Any));

        req.tool_choice = Some(
            serde_json::from_value::<ToolChoice>(json!({"type": "function", "function": {"name": "lookup"}})).unwrap(),
        );
        let body = serde_json::to_value(request(&req, None, &req.model, Vec::new()).unwrap()).unwrap();
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "lookup"}));
    }

    #[test]
    fn missing_content_is_rejected() {
        let req = request_from(json!({
            "model": "claude-sonnet-4-20250514",
            "messages": [{"role": "user", "content": null}]
        }));
        let err = request(&req, None, &req.model, Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "content is required");
    }

    #[test]
    fn unsupported_part_is_rejected() {
        let req = request_from(json!({
            "model": "claude-sonnet-4-20250514",
            "messages": [{"role": "user", "content": [{"type": "input_audio", "input_audio": {}}]}]
        }));
        let err = request(&req, None, &req.model, Vec::new()).unwrap_err();
        assert!(matches!(err, LlmError::UnsupportedContentType { kind } if kind == "input_audio"));
    }

    #[test]
    fn pdf_file_becomes_document() {
        let req = request_from(json!({
            "model": "claude-sonnet-4-20250514",
            "messages": [{"role": "user", "content": [
                {"type": "file", "file": {"file_data": "data:application/pdf;base64,JVBERg==", "filename": "a.pdf"}}
            ]}]
        }));
        let body = serde_json::to_value(request(&req, None, &req.model, Vec::new()).unwrap()).unwrap();
        assert_eq!(body["messages"][0]["content"][0]["type"], "document");
        assert_eq!(body["messages"][0]["content"][0]["source"]["media_type"], "application/pdf");
    }

    #[test]
    fn response_with_tool_use() {
        let resp: AnthropicResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-haiku-20240307",
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "Checking."},
                {"type": "tool_use", "id": "toolu_1", "name": "weather", "input": {"city": "Paris"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 8}
        }))
        .unwrap();

        let resp = response(resp, "claude-3-haiku-20240307").unwrap();
        let choice = &resp.choices[0];
        assert_eq!(choice.finish_reason, FinishReason::ToolCalls);
        assert_eq!(choice.message.content.as_deref(), Some("Checking."));
        let call = &choice.message.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.id, "toolu_1");
        assert_eq!(call.function.arguments, "{\"city\":\"Paris\"}");
        assert_eq!(resp.usage, Usage::new(12, 8));
    }

    #[test]
    fn response_without_output_tokens_fails() {
        let resp: AnthropicResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude-3-haiku-20240307",
            "content": [{"type": "text", "text": "hi"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12}
        }))
        .unwrap();

        assert!(matches!(
            response(resp, "claude-3-haiku-20240307"),
            Err(LlmError::MissingUsageFields { .. })
        ));
    }

    #[test]
    fn stop_reasons() {
        assert_eq!(finish_reason(Some("end_turn")), FinishReason::Stop);
        assert_eq!(finish_reason(Some("stop_sequence")), FinishReason::Stop);
        assert_eq!(finish_reason(Some("max_tokens")), FinishReason::Length);
        assert_eq!(finish_reason(Some("pause_turn")), FinishReason::Stop);
        assert_eq!(finish_reason(None), FinishReason::Stop);
    }

    #[test]
    fn decodes_event_triplets() {
        let mut decoder = AnthropicDecoder::new();
        let frames = [
            json!({"type": "message_start", "message": {"id": "msg_1", "model": "claude-x", "usage": {"input_tokens": 5, "output_tokens": 1}}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "ping"}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "f", "input": {}}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{}"}}),
            json!({"type": "content_block_stop", "index": 1}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 9}}),
            json!({"type": "message_stop"}),
        ];

        let events: Vec<_> = frames
            .iter()
            .flat_map(|frame| decoder.decode(&frame.to_string()).unwrap())
            .collect();

        assert_eq!(
            events,
            vec![
                VendorEvent::Started {
                    id: Some("msg_1".to_owned()),
                    model: Some("claude-x".to_owned())
                },
                VendorEvent::Usage {
                    prompt_tokens: Some(5),
                    completion_tokens: Some(1)
                },
                VendorEvent::Content {
                    index: 0,
                    text: String::new()
                },
                VendorEvent::Content {
                    index: 0,
                    text: "Hi".to_owned()
                },
                VendorEvent::ToolCall {
                    index: 0,
                    call: ToolCallDelta::start(0, "toolu_1", "f")
                },
                VendorEvent::ToolCall {
                    index: 0,
                    call: ToolCallDelta::arguments(0, "{}")
                },
                VendorEvent::Usage {
                    prompt_tokens: None,
                    completion_tokens: Some(9)
                },
                VendorEvent::Finished {
                    index: 0,
                    reason: FinishReason::ToolCalls
                },
            ]
        );
    }

    #[test]
    fn in_band_error_fails_the_stream() {
        let mut decoder = AnthropicDecoder::new();
        let err = decoder
            .decode(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "overloaded_error: Overloaded");
    }

    #[test]
    fn garbage_frames_are_skipped() {
        let mut decoder = AnthropicDecoder::new();
        assert!(decoder.decode("not json").unwrap().is_empty());
    }
}
