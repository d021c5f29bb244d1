//! Test server wrapper that starts Switchboard on a random port

use std::net::SocketAddr;

use switchboard_config::{Config, Credentials};
use switchboard_server::Server;
use tokio_util::sync::CancellationToken;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start a test server with the given configuration
    ///
    /// Credentials come from the config table only, so vendor keys in the
    /// developer's environment cannot leak into a test.
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let credentials = Credentials::default().overlay(&config.credentials);
        let server = Server::with_credentials(&config, credentials)?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            shutdown,
            client: reqwest::Client::new(),
        })
    }

    /// Absolute URL for `path` on the running server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Authorized `POST /v1/chat/completions`
    pub async fn chat(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/v1/chat/completions"))
            .bearer_auth(super::API_KEY)
            .json(body)
            .send()
            .await
            .expect("request reaches the test server")
    }

    /// Authorized `GET /v1/models`
    pub async fn models(&self) -> serde_json::Value {
        self.client
            .get(self.url("/v1/models"))
            .bearer_auth(super::API_KEY)
            .send()
            .await
            .expect("request reaches the test server")
            .json()
            .await
            .expect("model list is JSON")
    }

    /// URL on the Ollama-compatible surface, keyed with the shared secret
    pub fn ollama_url(&self, path: &str) -> String {
        self.url(&format!("/ollama/{}/v1{path}", super::API_KEY))
    }

    /// `POST /api/chat` on the Ollama-compatible surface
    pub async fn ollama_chat(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.ollama_url("/api/chat"))
            .json(body)
            .send()
            .await
            .expect("request reaches the test server")
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
