//! Wire format types for vendor-specific API protocols
//!
//! Each module contains pure serde structs matching the respective vendor's
//! JSON API format. These types are only used for serialization/deserialization
//! at the boundary and are not used internally. `ollama` is the exception in
//! direction: it is a format the gateway serves rather than calls.

pub mod anthropic;
pub mod cohere;
pub mod google;
pub mod ollama;
pub mod openai;
