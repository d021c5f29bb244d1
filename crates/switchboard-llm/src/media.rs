//! Resolution of image and file references to inline bytes

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::future::try_join_all;
use reqwest::Client;

use crate::error::LlmError;

/// Media type assumed when a remote server does not send one
const FALLBACK_MEDIA_TYPE: &str = "image/jpeg";

/// Binary payload ready to be embedded in a vendor request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData {
    /// MIME type, e.g. `image/png`
    pub media_type: String,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

impl InlineData {
    /// Base64 encoding of the payload
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Decode a `data:` URI without touching the network
///
/// Returns `Ok(None)` when `reference` is not a data URI.
pub fn decode_data_uri(reference: &str) -> Result<Option<InlineData>, LlmError> {
    let Some(rest) = reference.strip_prefix("data:") else {
        return Ok(None);
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| LlmError::malformed_reference(reference, "data URI has no payload"))?;

    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| LlmError::malformed_reference(reference, "only base64 data URIs are supported"))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| LlmError::malformed_reference(reference, format!("invalid base64: {e}")))?;

    let media_type = if media_type.is_empty() {
        "application/octet-stream".to_owned()
    } else {
        media_type.to_owned()
    };

    Ok(Some(InlineData { media_type, bytes }))
}

/// Resolve an image reference to inline bytes
///
/// Data URIs are decoded locally; any other reference is fetched once.
/// Failures are not retried.
pub async fn resolve(client: &Client, reference: &str) -> Result<InlineData, LlmError> {
    if let Some(inline) = decode_data_uri(reference)? {
        return Ok(inline);
    }

    let url = url::Url::parse(reference).map_err(|e| LlmError::malformed_reference(reference, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LlmError::malformed_reference(
            reference,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }

    let response = client.get(url).send().await.map_err(|e| {
        tracing::warn!(reference, error = %e, "image fetch failed");
        LlmError::fetch_failed(reference, e.to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(LlmError::fetch_failed(reference, format!("server returned {status}")));
    }

    let media_type = response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_owned());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| LlmError::fetch_failed(reference, e.to_string()))?;

    Ok(InlineData {
        media_type,
        bytes: bytes.to_vec(),
    })
}

/// Resolve several references concurrently, keeping their original order
pub async fn resolve_all<'a>(
    client: &Client,
    references: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<InlineData>, LlmError> {
    try_join_all(references.into_iter().map(|reference| resolve(client, reference))).await
}
