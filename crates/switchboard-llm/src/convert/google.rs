//! Conversion between canonical types and Gemini `generateContent`

use crate::error::LlmError;
use crate::media::{self, InlineData};
use crate::protocol::google::{
    GoogleCandidate, GoogleContent, GoogleFileData, GoogleFunctionCall, GoogleFunctionCallingConfig,
    GoogleFunctionDeclaration, GoogleFunctionResponse, GoogleGenerationConfig, GoogleInlineData, GooglePart,
    GoogleRequest, GoogleResponse, GoogleTool, GoogleToolConfig,
};
use crate::stream::{FrameDecoder, VendorEvent};
use crate::types::{
    ChatRequest, ChatResponse, Choice, ChoiceMessage, Content, ContentPart, FileRef, FinishReason, Message, Role,
    ToolCall, ToolCallDelta, ToolPolicy, Usage,
};

/// Part kinds Gemini accepts
pub const ACCEPTED_PARTS: &[&str] = &["text", "image_url", "file"];

const OCTET_STREAM: &str = "application/octet-stream";

/// Map a Gemini finish reason onto the canonical set
pub fn finish_reason(reason: &str, called_tools: bool) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" => {
            FinishReason::ContentFilter
        }
        _ if called_tools => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

// -- Request --

/// Build a `generateContent` request
///
/// `images` holds the resolved image parts of the user turns of `req`, in
/// message order.
pub fn request(req: &ChatRequest, vendor_model: &str, images: Vec<InlineData>) -> Result<GoogleRequest, LlmError> {
    let mut images = images.into_iter();
    let mut contents: Vec<GoogleContent> = Vec::new();

    for message in &req.messages {
        let (role, parts) = match message.role {
            Role::System => continue,
            Role::User => ("user", user_parts(message, &mut images)?),
            Role::Assistant => ("model", model_parts(message)),
            Role::Tool => ("user", vec![function_response(message, &req.messages)?]),
        };

        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
            _ => contents.push(GoogleContent {
                role: Some(role.to_owned()),
                parts,
            }),
        }
    }

    let system_instruction = super::hoisted_system(&req.messages).map(|text| GoogleContent {
        role: None,
        parts: vec![GooglePart::text(text)],
    });

    let tools = req.tools.as_ref().map(|tools| {
        vec![GoogleTool {
            function_declarations: tools
                .iter()
                .map(|tool| GoogleFunctionDeclaration {
                    name: tool.function.name.clone(),
                    description: tool.function.description.clone(),
                    parameters: tool.function.parameters.clone(),
                })
                .collect(),
        }]
    });

    let tool_config = req.tool_choice.as_ref().and_then(|choice| {
        let config = match choice.policy() {
            ToolPolicy::Auto => GoogleFunctionCallingConfig {
                mode: "AUTO",
                allowed_function_names: None,
            },
            ToolPolicy::Required => GoogleFunctionCallingConfig {
                mode: "ANY",
                allowed_function_names: None,
            },
            ToolPolicy::None => return None,
            ToolPolicy::Named(name) => GoogleFunctionCallingConfig {
                mode: "ANY",
                allowed_function_names: Some(vec![name.to_owned()]),
            },
        };
        Some(GoogleToolConfig {
            function_calling_config: config,
        })
    });

    Ok(GoogleRequest {
        contents,
        system_instruction,
        generation_config: GoogleGenerationConfig {
            temperature: req.temperature,
            top_p: req.top_p,
            max_output_tokens: super::max_tokens(req, vendor_model),
            stop_sequences: req.stop_sequences(),
            frequency_penalty: req.frequency_penalty,
            presence_penalty: req.presence_penalty,
            seed: req.seed,
        },
        tools,
        tool_config,
    })
}

fn user_parts(message: &Message, images: &mut impl Iterator<Item = InlineData>) -> Result<Vec<GooglePart>, LlmError> {
    let content = message
        .content
        .as_ref()
        .ok_or_else(|| LlmError::InvalidRequest("content is required".to_owned()))?;

    let parts = match content {
        Content::Text(text) => return Ok(vec![GooglePart::text(text.clone())]),
        Content::Parts(parts) => parts,
    };

    parts
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => Ok(GooglePart::text(text.clone())),
            ContentPart::ImageUrl { .. } => {
                let image = images
                    .next()
                    .ok_or_else(|| LlmError::Internal(anyhow::anyhow!("resolved images out of step with parts")))?;
                Ok(inline_part(&image))
            }
            ContentPart::File { file } => file_part(file),
            ContentPart::Unsupported { kind } => Err(LlmError::UnsupportedContentType { kind: kind.clone() }),
        })
        .collect()
}

fn inline_part(data: &InlineData) -> GooglePart {
    GooglePart {
        inline_data: Some(GoogleInlineData {
            mime_type: data.media_type.clone(),
            data: data.to_base64(),
        }),
        ..GooglePart::default()
    }
}

/// Inline data for data URIs, a file reference for uploaded files
fn file_part(file: &FileRef) -> Result<GooglePart, LlmError> {
    let guessed = file
        .filename
        .as_deref()
        .and_then(|name| mime_guess::from_path(name).first_raw())
        .unwrap_or(OCTET_STREAM);

    if let Some(reference) = file.file_data.as_deref() {
        let mut data = media::decode_data_uri(reference)?
            .ok_or_else(|| LlmError::malformed_reference(reference, "file_data must be a data URI"))?;
        if data.media_type == OCTET_STREAM {
            guessed.clone_into(&mut data.media_type);
        }
        return Ok(inline_part(&data));
    }

    let file_uri = file
        .file_id
        .clone()
        .ok_or_else(|| LlmError::InvalidRequest("file parts require file_data or file_id".to_owned()))?;

    Ok(GooglePart {
        file_data: Some(GoogleFileData {
            mime_type: guessed.to_owned(),
            file_uri,
        }),
        ..GooglePart::default()
    })
}

fn model_parts(message: &Message) -> Vec<GooglePart> {
    let mut parts = Vec::new();

    let text = message.text_content();
    if !text.is_empty() {
        parts.push(GooglePart::text(text));
    }

    for call in message.tool_calls.iter().flatten() {
        parts.push(GooglePart {
            function_call: Some(GoogleFunctionCall {
                id: None,
                name: call.function.name.clone(),
                args: super::parse_arguments(&call.function.arguments),
            }),
            ..GooglePart::default()
        });
    }

    if parts.is_empty() {
        parts.push(GooglePart::text(String::new()));
    }
    parts
}

/// Tool results are keyed by function name, looked up from the assistant turn
fn function_response(message: &Message, history: &[Message]) -> Result<GooglePart, LlmError> {
    let call_id = message
        .tool_call_id
        .as_deref()
        .ok_or_else(|| LlmError::InvalidRequest("tool messages require tool_call_id".to_owned()))?;
    let name = super::tool_name_for(history, call_id).unwrap_or(call_id);

    let text = message.text_content();
    let response = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        _ => serde_json::json!({ "content": text }),
    };

    Ok(GooglePart {
        function_response: Some(GoogleFunctionResponse {
            name: name.to_owned(),
            response,
        }),
        ..GooglePart::default()
    })
}

// -- Response --

/// Translate a complete `generateContent` response
pub fn response(resp: GoogleResponse, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let usage = resp
        .usage_metadata
        .ok_or_else(|| LlmError::MissingUsageFields {
            fields: vec!["prompt_tokens", "completion_tokens"],
        })?;
    let (prompt, completion) = LlmError::require_usage(usage.prompt_token_count, usage.completion_tokens())?;

    let mut next_call = 0;
    let choices = resp
        .candidates
        .into_iter()
        .zip(0u32..)
        .map(|(candidate, position)| choice(candidate, position, &mut next_call))
        .collect();

    Ok(ChatResponse {
        id: resp.response_id.unwrap_or_else(super::completion_id),
        object: ChatResponse::OBJECT.to_owned(),
        created: crate::types::unix_now(),
        model: resp
            .model_version
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| requested_model.to_owned()),
        choices,
        usage: Usage::new(prompt, completion),
    })
}

fn choice(candidate: GoogleCandidate, position: u32, next_call: &mut usize) -> Choice {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in candidate.content.parts {
        if part.thought {
            continue;
        }
        if let Some(fragment) = part.text {
            text.push_str(&fragment);
        }
        if let Some(call) = part.function_call {
            let id = call.id.unwrap_or_else(|| super::synthesized_call_id(*next_call));
            *next_call += 1;
            tool_calls.push(ToolCall::function(id, call.name, call.args.to_string()));
        }
    }

    let reason = finish_reason(candidate.finish_reason.as_deref().unwrap_or("STOP"), !tool_calls.is_empty());

    Choice {
        index: candidate.index.unwrap_or(position),
        message: ChoiceMessage::assistant(text, tool_calls),
        finish_reason: reason,
    }
}

// -- Stream --

/// Decodes `streamGenerateContent?alt=sse` frames
///
/// Every frame is a partial response: text fragments arrive flat, and the
/// last frame carries the finish reason and the usage metadata.
#[derive(Debug, Default)]
pub struct GoogleDecoder {
    started: bool,
    next_call: u32,
}

impl GoogleDecoder {
    /// Decoder for a fresh stream
    pub fn new() -> Self {
        Self::default()
    }

    fn convert(&mut self, frame: GoogleResponse) -> Vec<VendorEvent> {
        let mut events = Vec::new();

        if !self.started {
            self.started = true;
            events.push(VendorEvent::Started {
                id: frame.response_id,
                model: frame.model_version,
            });
        }

        if let Some(usage) = frame.usage_metadata {
            events.push(VendorEvent::Usage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.completion_tokens(),
            });
        }

        for (candidate, position) in frame.candidates.into_iter().zip(0u32..) {
            let index = candidate.index.unwrap_or(position);
            let mut called_tools = false;

            for part in candidate.content.parts {
                if part.thought {
                    continue;
                }
                if let Some(text) = part.text {
                    events.push(VendorEvent::Content { index, text });
                }
                if let Some(call) = part.function_call {
                    called_tools = true;
                    let call_index = self.next_call;
                    self.next_call += 1;
                    let id = call
                        .id
                        .unwrap_or_else(|| super::synthesized_call_id(call_index as usize));
                    events.push(VendorEvent::ToolCall {
                        index,
                        call: ToolCallDelta::start(call_index, id, call.name),
                    });
                    events.push(VendorEvent::ToolCall {
                        index,
                        call: ToolCallDelta::arguments(call_index, call.args.to_string()),
                    });
                }
            }

            if let Some(reason) = candidate.finish_reason {
                events.push(VendorEvent::Finished {
                    index,
                    reason: finish_reason(&reason, called_tools || self.next_call > 0),
                });
            }
        }

        events
    }
}

impl FrameDecoder for GoogleDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<VendorEvent>, LlmError> {
        match serde_json::from_str::<GoogleResponse>(data) {
            Ok(frame) => Ok(self.convert(frame)),
            Err(e) => {
                tracing::debug!(error = %e, data, "skipping unparseable gemini frame");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ToolChoice;

    fn request_from(value: serde_json::Value) -> ChatRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn maps_roles_and_tool_turns() {
        let req = request_from(json!({
            "model": "gemini-2.0-flash",
            "messages": [
                {"role": "system", "content": "answer in French"},
                {"role": "user", "content": "weather?"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "c1", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Lyon\"}"}}
                ]},
                {"role": "tool", "tool_call_id": "c1", "content": "sunny"},
            ],
            "temperature": 0,
            "stop": ["x", "y"]
        }));

        let body = serde_json::to_value(request(&req, &req.model, Vec::new()).unwrap()).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "answer in French");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["args"], json!({"city": "Lyon"}));
        assert_eq!(body["contents"][2]["parts"][0]["functionResponse"]["name"], "weather");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"],
            json!({"content": "sunny"})
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert_eq!(body["generationConfig"]["stopSequences"], json!(["x", "y"]));
    }

    #[test]
    fn images_and_files() {
        let req = request_from(json!({
            "model": "gemini-1.5-pro",
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "describe"},
                {"type": "image_url", "image_url": {"url": "https://example.com/cat.webp"}},
                {"type": "file", "file": {"file_data": "data:;base64,aGk=", "filename": "notes.txt"}},
                {"type": "file", "file": {"file_id": "https://generativelanguage.googleapis.com/v1beta/files/abc", "filename": "deck.pdf"}}
            ]}]
        }));

        let images = vec![InlineData {
            media_type: "image/webp".to_owned(),
            bytes: b"webp".to_vec(),
        }];
        let body = serde_json::to_value(request(&req, &req.model, images).unwrap()).unwrap();
        let parts = &body["contents"][0]["parts"];

        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/webp");
        assert_eq!(parts[2]["inlineData"]["mimeType"], "text/plain");
        assert_eq!(parts[2]["inlineData"]["data"], "aGk=");
        assert_eq!(parts[3]["fileData"]["mimeType"], "application/pdf");
        assert!(parts[3].get("text").is_none());
    }

    #[test]
    fn tool_choice_modes() {
        let mut req = ChatRequest::new("gemini-2.0-flash", vec![Message::text(Role::User, "hi")]);

        req.tool_choice = Some(serde_json::from_value::<ToolChoice>(json!("none")).unwrap());
        assert!(request(&req, &req.model, Vec::new()).unwrap().tool_config.is_none());

        req.tool_choice = Some(serde_json::from_value::<ToolChoice>(json!("required")).unwrap());
        let config = request(&req, &req.model, Vec::new()).unwrap().tool_config.unwrap();
        assert_eq!(config.function_calling_config.mode, "ANY");

        req.tool_choice = Some(
            serde_json::from_value::<ToolChoice>(json!({"type": "function", "function": {"name": "f"}})).unwrap(),
        );
        let config = request(&req, &req.model, Vec::new()).unwrap().tool_config.unwrap();
        assert_eq!(
            config.function_calling_config.allowed_function_names,
            Some(vec!["f".to_owned()])
        );
    }

    #[test]
    fn response_translation() {
        let resp: GoogleResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Hello"},
                    {"text": " there"}
                ]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "thoughtsTokenCount": 3, "totalTokenCount": 9},
            "modelVersion": "gemini-2.0-flash-001"
        }))
        .unwrap();

        let resp = response(resp, "gemini-2.0-flash").unwrap();
        assert_eq!(resp.content(), Some("Hello there"));
        assert_eq!(resp.model, "gemini-2.0-flash-001");
        assert_eq!(resp.usage, Usage::new(4, 5));
        assert_eq!(resp.choices[0].finish_reason, FinishReason::Stop);
    }

    #[test]
    fn function_calls_get_ids_and_tool_finish() {
        let resp: GoogleResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "a", "args": {"x": 1}}},
                    {"functionCall": {"name": "b", "args": {}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2}
        }))
        .unwrap();

        let resp = response(resp, "gemini-2.0-flash").unwrap();
        let calls = resp.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[1].id, "call_1");
        assert_eq!(calls[0].function.arguments, "{\"x\":1}");
        assert_eq!(resp.choices[0].finish_reason, FinishReason::ToolCalls);
        assert!(resp.choices[0].message.content.is_none());
        assert_eq!(resp.model, "gemini-2.0-flash");
    }

    #[test]
    fn missing_usage_metadata_fails() {
        let resp: GoogleResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "hi"}]}, "finishReason": "STOP"}]
        }))
        .unwrap();
        assert!(matches!(
            response(resp, "gemini-2.0-flash"),
            Err(LlmError::MissingUsageFields { .. })
        ));
    }

    #[test]
    fn finish_reasons() {
        assert_eq!(finish_reason("STOP", false), FinishReason::Stop);
        assert_eq!(finish_reason("MAX_TOKENS", true), FinishReason::Length);
        assert_eq!(finish_reason("SAFETY", false), FinishReason::ContentFilter);
        assert_eq!(finish_reason("OTHER", false), FinishReason::Stop);
    }

    #[test]
    fn decodes_flat_fragments_then_terminal_metadata() {
        let mut decoder = GoogleDecoder::new();
        let frames = [
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}}], "modelVersion": "gemini-x", "responseId": "r1"}),
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "lo"}]}}]}),
            json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": ""}]}, "finishReason": "MAX_TOKENS"}],
                "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2}
            }),
        ];

        let events: Vec<_> = frames
            .iter()
            .flat_map(|frame| decoder.decode(&frame.to_string()).unwrap())
            .collect();

        assert_eq!(
            events[0],
            VendorEvent::Started {
                id: Some("r1".to_owned()),
                model: Some("gemini-x".to_owned())
            }
        );
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                VendorEvent::Content { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hello");
        assert!(events.contains(&VendorEvent::Usage {
            prompt_tokens: Some(3),
            completion_tokens: Some(2)
        }));
        assert_eq!(
            events.last(),
            Some(&VendorEvent::Finished {
                index: 0,
                reason: FinishReason::Length
            })
        );
        assert_eq!(
            events.iter().filter(|e| matches!(e, VendorEvent::Started { .. })).count(),
            1
        );
    }

    #[test]
    fn streamed_function_call_is_complete() {
        let mut decoder = GoogleDecoder::new();
        let events = decoder
            .decode(
                &json!({"candidates": [{
                    "content": {"parts": [{"functionCall": {"name": "f", "args": {"q": "x"}}}]},
                    "finishReason": "STOP"
                }]})
                .to_string(),
            )
            .unwrap();

        assert!(events.contains(&VendorEvent::ToolCall {
            index: 0,
            call: ToolCallDelta::start(0, "call_0", "f")
        }));
        assert!(events.contains(&VendorEvent::ToolCall {
            index: 0,
            call: ToolCallDelta::arguments(0, "{\"q\":\"x\"}")
        }));
        assert_eq!(
            events.last(),
            Some(&VendorEvent::Finished {
                index: 0,
                reason: FinishReason::ToolCalls
            })
        );
    }
}
