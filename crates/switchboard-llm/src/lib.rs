//! Core LLM gateway crate for Switchboard
//!
//! Exposes one `OpenAI`-style chat completion contract over many vendor
//! backends. Each vendor adapter translates requests, responses and
//! streamed events to and from the canonical types in [`types`]; the
//! [`registry`] picks the adapter serving a requested model.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod convert;
pub mod error;
pub mod media;
pub mod protocol;
pub mod registry;
#[cfg(feature = "http")]
pub mod router;
pub mod stream;
pub mod types;

pub use adapter::{Adapter, AdapterContext};
pub use error::LlmError;
pub use registry::{credential_keys, dispatch, list_adapters, list_models};
#[cfg(feature = "http")]
pub use router::{LlmState, llm_router, ollama_router};
pub use stream::{ChunkStream, StreamMachine, StreamState};
pub use types::{ChatChunk, ChatRequest, ChatResponse};
