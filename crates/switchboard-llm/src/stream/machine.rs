use super::VendorEvent;
use crate::error::LlmError;
use crate::types::{ChatChunk, ChunkChoice, ChunkDelta, FinishReason, Role, Usage};

/// Lifecycle of one streamed completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Vendor stream opened, nothing emitted
    Init,
    /// Content is flowing
    Streaming,
    /// Finish reason emitted, waiting for final usage counters
    UsagePending,
    /// Nothing more will be emitted
    Terminal,
}

/// Turns vendor events into canonical chunks
///
/// Guarantees exactly one finish-reason chunk per completed stream and at
/// most one usage chunk, emitted last and only when requested.
#[derive(Debug)]
pub struct StreamMachine {
    state: StreamState,
    id: String,
    model: String,
    created: u64,
    include_usage: bool,
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    role_sent: bool,
    saw_event: bool,
}

impl StreamMachine {
    /// Create a machine for a request to `model`
    pub fn new(model: impl Into<String>, include_usage: bool) -> Self {
        Self {
            state: StreamState::Init,
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            model: model.into(),
            created: crate::types::unix_now(),
            include_usage,
            prompt_tokens: None,
            completion_tokens: None,
            role_sent: false,
            saw_event: false,
        }
    }

    /// Current state
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Whether the stream is finished and the vendor connection can be released
    pub fn is_terminal(&self) -> bool {
        self.state == StreamState::Terminal
    }

    /// Feed one vendor event
    pub fn on_event(&mut self, event: VendorEvent) -> Result<Vec<ChatChunk>, LlmError> {
        self.saw_event = true;

        match (self.state, event) {
            (StreamState::Terminal, _) => Ok(Vec::new()),
            (
                _,
                VendorEvent::Usage {
                    prompt_tokens,
                    completion_tokens,
                },
            ) => {
                self.prompt_tokens = prompt_tokens.or(self.prompt_tokens);
                self.completion_tokens = completion_tokens.or(self.completion_tokens);
                Ok(Vec::new())
            }
            (StreamState::UsagePending, event) => {
                tracing::debug!(?event, "ignoring vendor event after finish");
                Ok(Vec::new())
            }
            (StreamState::Init, VendorEvent::Started { id, model }) => {
                if let Some(id) = id.filter(|id| !id.is_empty()) {
                    self.id = id;
                }
                if let Some(model) = model.filter(|model| !model.is_empty()) {
                    self.model = model;
                }
                Ok(Vec::new())
            }
            (_, VendorEvent::Started { .. }) => Ok(Vec::new()),
            (_, VendorEvent::Content { index, text }) => {
                if text.is_empty() {
                    return Ok(Vec::new());
                }
                self.state = StreamState::Streaming;
                let delta = ChunkDelta {
                    content: Some(text),
                    ..ChunkDelta::default()
                };
                Ok(vec![self.choice_chunk(index, delta, None)])
            }
            (_, VendorEvent::ToolCall { index, call }) => {
                self.state = StreamState::Streaming;
                let delta = ChunkDelta {
                    tool_calls: Some(vec![call]),
                    ..ChunkDelta::default()
                };
                Ok(vec![self.choice_chunk(index, delta, None)])
            }
            (_, VendorEvent::Finished { index, reason }) => Ok(vec![self.finish(index, reason)]),
        }
    }

    /// The vendor stream ended
    ///
    /// A clean close without an end-of-turn event finishes with `stop`; a
    /// close before any event at all is an upstream failure.
    pub fn on_close(&mut self) -> Result<Vec<ChatChunk>, LlmError> {
        match self.state {
            StreamState::Terminal => Ok(Vec::new()),
            StreamState::Init if !self.saw_event => {
                self.state = StreamState::Terminal;
                Err(LlmError::upstream("vendor stream ended without a response"))
            }
            StreamState::Init | StreamState::Streaming => {
                let finish = self.finish(0, FinishReason::Stop);
                let mut chunks = vec![finish];
                chunks.extend(self.on_close()?);
                Ok(chunks)
            }
            StreamState::UsagePending => {
                self.state = StreamState::Terminal;
                let (prompt, completion) = LlmError::require_usage(self.prompt_tokens, self.completion_tokens)?;
                Ok(vec![self.usage_chunk(Usage::new(prompt, completion))])
            }
        }
    }

    fn finish(&mut self, index: u32, reason: FinishReason) -> ChatChunk {
        self.state = if self.include_usage {
            StreamState::UsagePending
        } else {
            StreamState::Terminal
        };
        self.choice_chunk(index, ChunkDelta::default(), Some(reason))
    }

    fn choice_chunk(&mut self, index: u32, mut delta: ChunkDelta, finish_reason: Option<FinishReason>) -> ChatChunk {
        if !self.role_sent {
            delta.role = Some(Role::Assistant);
            self.role_sent = true;
        }

        self.chunk(
            vec![ChunkChoice {
                index,
                delta,
                finish_reason,
            }],
            None,
        )
    }

    fn usage_chunk(&self, usage: Usage) -> ChatChunk {
        self.chunk(Vec::new(), Some(usage))
    }

    fn chunk(&self, choices: Vec<ChunkChoice>, usage: Option<Usage>) -> ChatChunk {
        ChatChunk {
            id: self.id.clone(),
            object: ChatChunk::OBJECT.to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices,
            usage,
        }
    }
}
