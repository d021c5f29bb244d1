//! Reassembly of vendor event streams into canonical chunk sequences
//!
//! Each vendor protocol is first decoded into [`VendorEvent`]s by a
//! [`FrameDecoder`]. A [`StreamMachine`] turns those events into
//! [`ChatChunk`]s, and a producer task feeds them through a bounded channel
//! to the transport.

mod frames;
mod machine;
mod producer;

use std::pin::Pin;

use futures_util::Stream;

pub use frames::{ndjson_events, sse_events};
pub use machine::{StreamMachine, StreamState};
pub use producer::{empty, spawn_chunk_stream};

use crate::error::LlmError;
use crate::types::{ChatChunk, FinishReason, ToolCallDelta};

/// Canonical chunk sequence handed to the transport
///
/// Yields `Err` at most once, as its final item. Ends with `None` on clean
/// completion and on cancellation.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>>;

/// Normalised vendor events feeding a [`StreamMachine`]
pub type VendorEventStream = Pin<Box<dyn Stream<Item = Result<VendorEvent, LlmError>> + Send>>;

/// Vendor-neutral unit of streamed output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorEvent {
    /// Response metadata became known
    Started {
        /// Vendor response id
        id: Option<String>,
        /// Model that serves the request
        model: Option<String>,
    },
    /// Text fragment for a choice
    Content {
        /// Choice index
        index: u32,
        /// Fragment, forwarded verbatim
        text: String,
    },
    /// Tool call fragment for a choice
    ToolCall {
        /// Choice index
        index: u32,
        /// Fragment
        call: ToolCallDelta,
    },
    /// Token counters; later values replace earlier ones
    Usage {
        /// Prompt tokens, if reported by this frame
        prompt_tokens: Option<u32>,
        /// Completion tokens, if reported by this frame
        completion_tokens: Option<u32>,
    },
    /// End of turn
    Finished {
        /// Choice index
        index: u32,
        /// Mapped finish reason
        reason: FinishReason,
    },
}

/// Converts one raw vendor frame into zero or more [`VendorEvent`]s
pub trait FrameDecoder: Send + 'static {
    /// Decode the payload of one frame (an SSE `data` field or an NDJSON line)
    fn decode(&mut self, data: &str) -> Result<Vec<VendorEvent>, LlmError>;
}
