use std::net::SocketAddr;

use secrecy::SecretString;
use serde::Deserialize;

use crate::cors::CorsConfig;

/// Default capacity of the channel between a stream producer and the transport
pub const DEFAULT_STREAM_BUFFER: usize = 16;

/// HTTP server configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default)]
    pub listen_address: Option<SocketAddr>,
    /// Shared bearer secret; falls back to the `API_KEY` credential
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Chunks buffered between a vendor stream and the client connection
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
    /// CORS policy; no CORS layer is installed when absent
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            api_key: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            cors: None,
        }
    }
}

const fn default_stream_buffer() -> usize {
    DEFAULT_STREAM_BUFFER
}
