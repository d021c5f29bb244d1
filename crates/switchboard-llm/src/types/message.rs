use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    #[serde(alias = "developer")]
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool/function result
    Tool,
}

/// Message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Message content; may be null on assistant turns that only call tools
    #[serde(default)]
    pub content: Option<Content>,
    /// Optional participant name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is a response to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Plain-text message with the given role
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(Content::Text(text.into())),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Concatenated text of this message, ignoring non-text parts
    pub fn text_content(&self) -> String {
        self.content.as_ref().map(Content::as_text).unwrap_or_default()
    }
}

/// Message content, either plain text or structured parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content
    Text(String),
    /// Ordered content parts (text, images, files)
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Extract text content, joining text parts
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// Individual part within a multipart message
///
/// Unknown part types deserialize into [`ContentPart::Unsupported`] so that
/// the adapter can reject them with a precise error instead of failing the
/// whole body parse.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content block
    Text {
        /// The text string
        text: String,
    },
    /// Image reference (remote URL or data URI)
    ImageUrl {
        /// Image location
        image_url: ImageUrl,
    },
    /// File reference
    File {
        /// File location
        file: FileRef,
    },
    /// Part type this gateway does not translate
    #[serde(skip_serializing)]
    Unsupported {
        /// The `type` tag as sent by the caller
        kind: String,
    },
}

impl ContentPart {
    /// The part's `type` tag
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::ImageUrl { .. } => "image_url",
            Self::File { .. } => "file",
            Self::Unsupported { kind } => kind,
        }
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(tag = "type", rename_all = "snake_case")]
        enum Known {
            Text { text: String },
            ImageUrl { image_url: ImageUrl },
            File { file: FileRef },
        }

        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| de::Error::missing_field("type"))?;

        match kind {
            "text" | "image_url" | "file" => {
                let known = Known::deserialize(value).map_err(de::Error::custom)?;
                Ok(match known {
                    Known::Text { text } => Self::Text { text },
                    Known::ImageUrl { image_url } => Self::ImageUrl { image_url },
                    Known::File { file } => Self::File { file },
                })
            }
            other => Ok(Self::Unsupported { kind: other.to_owned() }),
        }
    }
}

/// Image location within an `image_url` part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Remote URL or `data:` URI
    pub url: String,
    /// Detail level hint (e.g. "auto", "low", "high")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// File location within a `file` part
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRef {
    /// Vendor-side file identifier or URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Inline file contents as a `data:` URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    /// Original file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// A tool/function call requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Tool type (always "function")
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    /// Name of the function to call
    pub function: FunctionCall,
}

impl ToolCall {
    /// Build a function tool call
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name and arguments within a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

pub(crate) fn function_type() -> String {
    "function".to_owned()
}
