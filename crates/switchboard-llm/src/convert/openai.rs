//! Conversion between canonical types and `OpenAI`-compatible chat completions

use crate::error::LlmError;
use crate::protocol::openai::{OpenAiChatRequest, OpenAiResponse, OpenAiStreamChunk};
use crate::stream::{FrameDecoder, VendorEvent};
use crate::types::{ChatRequest, ChatResponse, Choice, ChoiceMessage, FinishReason, StreamOptions, ToolCall, Usage};

/// Part kinds the chat completions API accepts
pub const ACCEPTED_PARTS: &[&str] = &["text", "image_url", "file"];

/// Which request field carries the output budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenField {
    /// `max_tokens`, understood by every compatible vendor
    MaxTokens,
    /// `max_completion_tokens`, required by newer `OpenAI` models
    MaxCompletionTokens,
}

/// Map an `OpenAI` finish reason onto the canonical set
pub fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// -- Request --

/// Build a chat completions request addressed to `vendor_model`
pub fn request(req: &ChatRequest, vendor_model: &str, token_field: TokenField) -> OpenAiChatRequest {
    let budget = super::max_tokens(req, vendor_model);
    let (max_tokens, max_completion_tokens) = match token_field {
        TokenField::MaxTokens => (Some(budget), None),
        TokenField::MaxCompletionTokens => (None, Some(budget)),
    };

    OpenAiChatRequest {
        model: vendor_model.to_owned(),
        messages: req.messages.clone(),
        temperature: req.temperature,
        top_p: req.top_p,
        max_tokens,
        max_completion_tokens,
        stop: req.stop_sequences(),
        frequency_penalty: req.frequency_penalty,
        presence_penalty: req.presence_penalty,
        seed: req.seed,
        user: req.user.clone(),
        tools: req.tools.clone(),
        tool_choice: req.tool_choice.clone(),
        stream: req.stream,
        stream_options: (req.stream && req.include_usage()).then_some(StreamOptions { include_usage: true }),
        extra: req.extra.clone(),
    }
}

// -- Response --

/// Translate a complete chat completions response
pub fn response(resp: OpenAiResponse, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let usage = resp.usage.unwrap_or_default();
    let (prompt, completion) = LlmError::require_usage(usage.prompt_tokens, usage.completion_tokens)?;

    let mut next_call = 0;
    let choices = resp
        .choices
        .into_iter()
        .map(|choice| {
            let tool_calls: Vec<ToolCall> = choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|mut call| {
                    if call.id.is_empty() {
                        call.id = super::synthesized_call_id(next_call);
                    }
                    next_call += 1;
                    call
                })
                .collect();

            Choice {
                index: choice.index,
                message: ChoiceMessage::assistant(choice.message.content.unwrap_or_default(), tool_calls),
                finish_reason: finish_reason(choice.finish_reason.as_deref().unwrap_or("stop")),
            }
        })
        .collect();

    Ok(ChatResponse {
        id: if resp.id.is_empty() { super::completion_id() } else { resp.id },
        object: ChatResponse::OBJECT.to_owned(),
        created: if resp.created == 0 { crate::types::unix_now() } else { resp.created },
        model: if resp.model.is_empty() {
            requested_model.to_owned()
        } else {
            resp.model
        },
        choices,
        usage: Usage::new(prompt, completion),
    })
}

// -- Stream --

/// Decodes chat completion chunks from any `OpenAI`-compatible vendor
#[derive(Debug, Default)]
pub struct OpenAiDecoder {
    started: bool,
}

impl OpenAiDecoder {
    /// Decoder for a fresh stream
    pub fn new() -> Self {
        Self::default()
    }

    fn convert(&mut self, chunk: OpenAiStreamChunk) -> Vec<VendorEvent> {
        let mut events = Vec::new();

        if !self.started {
            self.started = true;
            events.push(VendorEvent::Started {
                id: chunk.id,
                model: chunk.model,
            });
        }

        let mut finished = Vec::new();
        for choice in chunk.choices {
            let index = choice.index;
            if let Some(text) = choice.delta.content {
                events.push(VendorEvent::Content { index, text });
            }
            for call in choice.delta.tool_calls.into_iter().flatten() {
                events.push(VendorEvent::ToolCall { index, call });
            }
            if let Some(reason) = choice.finish_reason {
                finished.push(VendorEvent::Finished {
                    index,
                    reason: finish_reason(&reason),
                });
            }
        }

        if let Some(usage) = chunk.usage {
            events.push(VendorEvent::Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            });
        }

        events.extend(finished);
        events
    }
}

impl FrameDecoder for OpenAiDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<VendorEvent>, LlmError> {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(data)
            && let Some(error) = value.get("error")
        {
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| error.to_string(), ToOwned::to_owned);
            return Err(LlmError::upstream(message));
        }

        match serde_json::from_str::<OpenAiStreamChunk>(data) {
            Ok(chunk) => Ok(self.convert(chunk)),
            Err(e) => {
                tracing::debug!(error = %e, data, "skipping unparseable chat completion chunk");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ToolCallDelta;

    fn sample_request() -> ChatRequest {
        serde_json::from_value(json!({
            "model": "groq/llama-3.3-70b-versatile",
            "messages": [
                {"role": "system", "content": "terse"},
                {"role": "user", "content": [{"type": "text", "text": "Hello!"}]}
            ],
            "temperature": 0,
            "stop": "\n\n",
            "stream": true,
            "stream_options": {"include_usage": false}
        }))
        .unwrap()
    }

    #[test]
    fn passes_body_through_with_vendor_model() {
        let req = sample_request();
        let body = serde_json::to_value(request(&req, "llama-3.3-70b-versatile", TokenField::MaxTokens)).unwrap();

        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "terse"}));
        assert_eq!(body["messages"][1]["content"][0]["text"], "Hello!");
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("max_completion_tokens").is_none());
        assert_eq!(body["stop"], json!(["\n\n"]));
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn unlisted_fields_reach_the_vendor() {
        let req: ChatRequest = serde_json::from_value(json!({
            "model": "deepseek-chat",
            "messages": [{"role": "user", "content": "json please"}],
            "response_format": {"type": "json_object"},
            "n": 2,
            "logprobs": true
        }))
        .unwrap();

        let body = serde_json::to_value(request(&req, "deepseek-chat", TokenField::MaxTokens)).unwrap();

        assert_eq!(body["response_format"], json!({"type": "json_object"}));
        assert_eq!(body["n"], 2);
        assert_eq!(body["logprobs"], true);
        assert_eq!(body["max_tokens"], 8192);
    }

    #[test]
    fn usage_option_only_when_requested() {
        let mut req = sample_request();
        req.stream_options = Some(StreamOptions { include_usage: true });

        let body = serde_json::to_value(request(&req, "gpt-4o-mini", TokenField::MaxCompletionTokens)).unwrap();
        assert_eq!(body["stream_options"], json!({"include_usage": true}));
        assert_eq!(body["max_completion_tokens"], 16384);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn response_keeps_vendor_model_and_balances_usage() {
        let resp: OpenAiResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 13}
        }))
        .unwrap();

        let resp = response(resp, "gpt-4o-mini").unwrap();
        assert_eq!(resp.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(resp.content(), Some("Hi!"));
        assert_eq!(resp.usage, Usage::new(9, 3));
        assert_eq!(resp.created, 1_700_000_000);
    }

    #[test]
    fn response_without_usage_fails() {
        let resp: OpenAiResponse = serde_json::from_value(json!({
            "id": "x",
            "model": "m",
            "choices": [{"index": 0, "message": {"content": "Hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 9}
        }))
        .unwrap();

        let err = response(resp, "m").unwrap_err();
        assert!(matches!(err, LlmError::MissingUsageFields { fields } if fields == ["completion_tokens"]));
    }

    #[test]
    fn unknown_finish_reason_is_stop() {
        assert_eq!(finish_reason("eos"), FinishReason::Stop);
        assert_eq!(finish_reason("function_call"), FinishReason::ToolCalls);
    }

    #[test]
    fn decodes_chunks_usage_before_finish() {
        let mut decoder = OpenAiDecoder::new();
        let first = decoder
            .decode(r#"{"id":"c1","model":"m1","choices":[{"index":0,"delta":{"role":"assistant","content":"He"}}]}"#)
            .unwrap();
        assert_eq!(
            first,
            vec![
                VendorEvent::Started {
                    id: Some("c1".to_owned()),
                    model: Some("m1".to_owned())
                },
                VendorEvent::Content {
                    index: 0,
                    text: "He".to_owned()
                },
            ]
        );

        let last = decoder
            .decode(
                r#"{"id":"c1","choices":[{"index":0,"delta":{},"finish_reason":"length"}],"usage":{"prompt_tokens":1,"completion_tokens":2}}"#,
            )
            .unwrap();
        assert_eq!(
            last,
            vec![
                VendorEvent::Usage {
                    prompt_tokens: Some(1),
                    completion_tokens: Some(2)
                },
                VendorEvent::Finished {
                    index: 0,
                    reason: FinishReason::Length
                },
            ]
        );
    }

    #[test]
    fn decodes_tool_call_fragments() {
        let mut decoder = OpenAiDecoder::new();
        let events = decoder
            .decode(
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"f","arguments":""}}]}}]}"#,
            )
            .unwrap();
        assert_eq!(
            events[1],
            VendorEvent::ToolCall {
                index: 0,
                call: ToolCallDelta::start(0, "call_1", "f")
            }
        );
    }

    #[test]
    fn in_band_error_fails_the_stream() {
        let mut decoder = OpenAiDecoder::new();
        let err = decoder.decode(r#"{"error":{"message":"rate limited"}}"#).unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
    }
}
