//! Rendering canonical responses and chunks in the Ollama chat format
//!
//! The direction is reversed compared to the vendor modules: the gateway
//! answers Ollama clients, so canonical output is translated outward.

use std::collections::BTreeMap;

use jiff::Timestamp;

use crate::protocol::ollama::{OllamaChatResponse, OllamaFunctionCall, OllamaMessage, OllamaModel, OllamaModelList, OllamaToolCall};
use crate::types::{ChatChunk, ChatResponse, ModelList, ToolCallDelta, Usage};

const ASSISTANT: &str = "assistant";

/// RFC 3339 rendering of a Unix timestamp, the current time when out of range
pub fn rfc3339(seconds: u64) -> String {
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| Timestamp::from_second(seconds).ok())
        .unwrap_or_else(Timestamp::now)
        .to_string()
}

/// Complete reply to a non-streaming `/api/chat` request
pub fn response(resp: ChatResponse) -> OllamaChatResponse {
    let created_at = rfc3339(resp.created);
    let choice = resp.choices.into_iter().find(|choice| choice.index == 0);

    let (content, tool_calls, reason) = match choice {
        Some(choice) => {
            let tool_calls = choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|call| tool_call(call.function.name, &call.function.arguments))
                .collect();
            (choice.message.content.unwrap_or_default(), tool_calls, Some(choice.finish_reason))
        }
        None => (String::new(), Vec::new(), None),
    };

    OllamaChatResponse {
        model: resp.model,
        created_at,
        message: OllamaMessage {
            role: ASSISTANT,
            content,
            tool_calls,
        },
        done_reason: reason,
        done: true,
        prompt_eval_count: Some(resp.usage.prompt_tokens),
        eval_count: Some(resp.usage.completion_tokens),
    }
}

/// Tag listing for the models the gateway serves
pub fn models(list: ModelList) -> OllamaModelList {
    OllamaModelList {
        models: list
            .data
            .into_iter()
            .map(|card| OllamaModel {
                modified_at: rfc3339(card.created),
                model: card.id.clone(),
                name: card.id,
                details: serde_json::Map::new(),
            })
            .collect(),
    }
}

fn tool_call(name: String, arguments: &str) -> OllamaToolCall {
    OllamaToolCall {
        function: OllamaFunctionCall {
            name,
            arguments: super::parse_arguments(arguments),
        },
    }
}

/// Turns a canonical chunk stream into Ollama reply lines
///
/// Content fragments are forwarded as they come. Tool call fragments are
/// collected and sent whole on the final line, which is held back until
/// the usage chunk (if one was requested) or the end of the stream.
#[derive(Debug, Default)]
pub struct OllamaLines {
    tool_calls: BTreeMap<u32, (String, String)>,
    last: Option<OllamaChatResponse>,
}

impl OllamaLines {
    /// Converter for a fresh stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to send for `chunk`
    pub fn push(&mut self, chunk: ChatChunk) -> Vec<OllamaChatResponse> {
        if let Some(usage) = chunk.usage {
            return vec![self.with_usage(&chunk, usage)];
        }

        let Some(choice) = chunk.choices.into_iter().find(|choice| choice.index == 0) else {
            return Vec::new();
        };

        for delta in choice.delta.tool_calls.into_iter().flatten() {
            self.collect(delta);
        }

        let content = choice.delta.content.unwrap_or_default();
        match choice.finish_reason {
            Some(reason) => {
                let tool_calls = std::mem::take(&mut self.tool_calls)
                    .into_values()
                    .map(|(name, arguments)| tool_call(name, &arguments))
                    .collect();
                self.last = Some(OllamaChatResponse {
                    model: chunk.model,
                    created_at: rfc3339(chunk.created),
                    message: OllamaMessage {
                        role: ASSISTANT,
                        content,
                        tool_calls,
                    },
                    done_reason: Some(reason),
                    done: true,
                    prompt_eval_count: None,
                    eval_count: None,
                });
                Vec::new()
            }
            None if content.is_empty() => Vec::new(),
            None => vec![OllamaChatResponse {
                model: chunk.model,
                created_at: rfc3339(chunk.created),
                message: OllamaMessage {
                    role: ASSISTANT,
                    content,
                    tool_calls: Vec::new(),
                },
                done_reason: None,
                done: false,
                prompt_eval_count: None,
                eval_count: None,
            }],
        }
    }

    /// The held-back final line, once the stream has ended
    pub fn finish(&mut self) -> Option<OllamaChatResponse> {
        self.last.take()
    }

    fn with_usage(&mut self, chunk: &ChatChunk, usage: Usage) -> OllamaChatResponse {
        let mut last = self.last.take().unwrap_or_else(|| OllamaChatResponse {
            model: chunk.model.clone(),
            created_at: rfc3339(chunk.created),
            message: OllamaMessage {
                role: ASSISTANT,
                content: String::new(),
                tool_calls: Vec::new(),
            },
            done_reason: None,
            done: true,
            prompt_eval_count: None,
            eval_count: None,
        });
        last.prompt_eval_count = Some(usage.prompt_tokens);
        last.eval_count = Some(usage.completion_tokens);
        last
    }

    fn collect(&mut self, delta: ToolCallDelta) {
        let entry = self.tool_calls.entry(delta.index).or_default();
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.0.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.1.push_str(&arguments);
            }
        }
    }
}
