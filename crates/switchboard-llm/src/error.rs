use http::StatusCode;
use switchboard_core::HttpError;
use thiserror::Error;

/// Errors that can occur while serving a chat completion
///
/// Cancellation is not an error: a cancelled stream simply ends.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No configured adapter declares the requested model
    #[error("Model {model} not supported")]
    UnsupportedModel { model: String },

    /// A message content part cannot be translated for the vendor
    #[error("Unsupported message content type {kind}")]
    UnsupportedContentType { kind: String },

    /// A referenced resource could not be resolved during translation
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// The reference as sent by the caller (truncated for data URIs)
        url: String,
        /// What went wrong
        reason: String,
        /// The reference itself was malformed, no network call was made
        malformed: bool,
    },

    /// The vendor call failed
    #[error("{message}")]
    Upstream {
        /// Status reported by the vendor, if a response was received
        status: Option<StatusCode>,
        /// Error details
        message: String,
    },

    /// The vendor omitted token counters
    #[error("vendor response is missing usage fields: {}", .fields.join(", "))]
    MissingUsageFields { fields: Vec<&'static str> },

    /// Client sent a malformed or invalid request
    #[error("{0}")]
    InvalidRequest(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Vendor call failed before or without an HTTP status
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// Vendor answered with a non-success status
    pub fn upstream_status(status: StatusCode, body: &str) -> Self {
        Self::Upstream {
            status: Some(status),
            message: format!("vendor returned {status}: {}", body.trim()),
        }
    }

    /// Reference that could not be parsed
    pub fn malformed_reference(url: &str, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: display_reference(url),
            reason: reason.into(),
            malformed: true,
        }
    }

    /// Reference whose network fetch failed
    pub fn fetch_failed(url: &str, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: display_reference(url),
            reason: reason.into(),
            malformed: false,
        }
    }

    /// Check both counters and fail on whichever is absent
    pub fn require_usage(prompt: Option<u32>, completion: Option<u32>) -> Result<(u32, u32), Self> {
        match (prompt, completion) {
            (Some(prompt), Some(completion)) => Ok((prompt, completion)),
            (prompt, completion) => {
                let mut fields = Vec::new();
                if prompt.is_none() {
                    fields.push("prompt_tokens");
                }
                if completion.is_none() {
                    fields.push("completion_tokens");
                }
                Err(Self::MissingUsageFields { fields })
            }
        }
    }
}

/// Keep data URIs out of error messages
fn display_reference(url: &str) -> String {
    if url.starts_with("data:") {
        let header = url.split_once(',').map_or(url, |(header, _)| header);
        format!("{header},...")
    } else {
        url.to_owned()
    }
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedModel { .. } | Self::UnsupportedContentType { .. } | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Fetch { malformed: true, .. } => StatusCode::BAD_REQUEST,
            Self::Fetch { malformed: false, .. } | Self::MissingUsageFields { .. } => StatusCode::BAD_GATEWAY,
            Self::Upstream { status, .. } => status
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::UnsupportedModel { .. } | Self::UnsupportedContentType { .. } | Self::InvalidRequest(_) => {
                "invalid_request_error"
            }
            Self::Fetch { .. } => "fetch_error",
            Self::Upstream { .. } | Self::MissingUsageFields { .. } => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
