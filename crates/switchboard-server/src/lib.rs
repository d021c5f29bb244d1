//! HTTP server assembly for the Switchboard gateway

mod auth;
mod cors;

use std::net::SocketAddr;

use axum::response::IntoResponse;
use axum::{Json, Router};
use http::StatusCode;
use secrecy::SecretString;
use switchboard_config::{Config, Credentials};
use switchboard_core::ErrorBody;
use switchboard_llm::{AdapterContext, LlmState};
use tower_http::trace::TraceLayer;

pub use auth::AuthError;

/// Address used when neither the config nor the CLI names one
pub const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8000);

/// Credential key holding the shared bearer secret when `server.api_key` is unset
const API_KEY_CREDENTIAL: &str = "API_KEY";

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// Vendor credentials are captured once here, from the environment
    /// overlaid with the `[credentials]` table.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let keys = switchboard_llm::credential_keys().into_iter().chain([API_KEY_CREDENTIAL]);
        let credentials = config.credentials(keys);
        Self::with_credentials(config, credentials)
    }

    /// Build the server from configuration and an explicit credential snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn with_credentials(config: &Config, credentials: Credentials) -> anyhow::Result<Self> {
        let listen_address = config.server.listen_address.unwrap_or(DEFAULT_LISTEN_ADDRESS);

        let api_key = config
            .server
            .api_key
            .clone()
            .or_else(|| credentials.get(API_KEY_CREDENTIAL).map(SecretString::from));
        if api_key.is_none() {
            tracing::warn!("no API key configured, every request will be rejected");
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;
        let context = AdapterContext::new(client, config.server.stream_buffer);

        let state = LlmState::new(credentials, context);
        let mut app = switchboard_llm::llm_router(state.clone()).fallback(not_found);

        // Later layers wrap earlier ones: CORS answers preflights before auth sees them
        let bearer_secret = api_key.clone();
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let secret = bearer_secret.clone();
            async move { auth::auth_middleware(secret, req, next).await }
        }));

        // Merged after the bearer layer: Ollama clients authenticate by path key
        let ollama = switchboard_llm::ollama_router(state)
            .route_layer(axum::middleware::from_fn_with_state(api_key, auth::path_key_middleware));
        app = app.merge(ollama);

        if let Some(ref cors_config) = config.server.cors {
            app = app.layer(cors::cors_layer(cors_config));
        }

        app = app.layer(TraceLayer::new_for_http());

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Override the listen address
    #[must_use]
    pub const fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = listen_address;
        self
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not found")))
}
