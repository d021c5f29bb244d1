use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use switchboard_core::HttpError;

/// Rejection produced by the bearer check
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No shared secret is configured, so nothing can be authorized
    #[error("no API key configured")]
    NotConfigured,
    /// The request carried no bearer token
    #[error("missing bearer token")]
    MissingToken,
    /// The bearer token does not match the shared secret
    #[error("bearer token mismatch")]
    InvalidToken,
}

impl HttpError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_type(&self) -> &str {
        "authentication_error"
    }

    fn client_message(&self) -> String {
        "Unauthorized".to_owned()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status_code(), axum::Json(self.to_body())).into_response()
    }
}

/// Check `Authorization: Bearer <token>` against the shared secret
pub fn authorize(secret: Option<&SecretString>, request: &Request) -> Result<(), AuthError> {
    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    verify(secret, token)
}

/// Check a presented token against the shared secret
pub fn verify(secret: Option<&SecretString>, token: Option<&str>) -> Result<(), AuthError> {
    let secret = secret.ok_or(AuthError::NotConfigured)?;
    let token = token.ok_or(AuthError::MissingToken)?;

    if tokens_match(token.as_bytes(), secret.expose_secret().as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

/// Byte comparison whose running time depends only on the lengths
fn tokens_match(token: &[u8], secret: &[u8]) -> bool {
    token.len() == secret.len() && token.iter().zip(secret).fold(0u8, |diff, (a, b)| diff | (a ^ b)) == 0
}

/// Reject every request whose bearer token does not match `secret`
pub async fn auth_middleware(secret: Option<SecretString>, request: Request, next: Next) -> Response {
    match authorize(secret.as_ref(), &request) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(error = %e, path = %request.uri().path(), "request rejected by bearer check");
            e.into_response()
        }
    }
}

/// Reject Ollama requests whose `{api_key}` path segment does not match `secret`
pub async fn path_key_middleware(
    State(secret): State<Option<SecretString>>,
    Path(api_key): Path<String>,
    request: Request,
    next: Next,
) -> Response {
    match verify(secret.as_ref(), Some(api_key.as_str())) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(error = %e, "request rejected by path key check");
            e.into_response()
        }
    }
}
