#![allow(dead_code)]

pub mod config;
pub mod mock_vendor;
pub mod server;

/// Shared bearer secret every test server is configured with
pub const API_KEY: &str = "test-secret";

/// Parse SSE `data:` payloads from raw response text
pub fn sse_data(text: &str) -> Vec<serde_json::Value> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .map(|data| serde_json::from_str(data).expect("SSE payload is JSON"))
        .collect()
}

/// Concatenated `delta.content` of a chunk sequence
pub fn streamed_content(chunks: &[serde_json::Value]) -> String {
    chunks
        .iter()
        .filter_map(|chunk| chunk["choices"].get(0))
        .filter_map(|choice| choice["delta"]["content"].as_str())
        .collect()
}
