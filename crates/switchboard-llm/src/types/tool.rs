use serde::{Deserialize, Serialize};

/// Definition of a tool the model can call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (always "function")
    #[serde(rename = "type", default = "super::message::function_type")]
    pub tool_type: String,
    /// Function specification
    pub function: FunctionDefinition,
}

/// Specification of a callable function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the function parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl FunctionDefinition {
    /// Parameter schema, defaulting to an empty object schema
    pub fn schema(&self) -> serde_json::Value {
        self.parameters
            .clone()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}))
    }
}

/// How the model should select tools, as sent on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// `"none"`, `"auto"`, or `"required"`
    Mode(ToolChoiceMode),
    /// `{"type": "function", "function": {"name": ...}}`
    Named(NamedToolChoice),
}

impl ToolChoice {
    /// Normalised policy
    pub fn policy(&self) -> ToolPolicy<'_> {
        match self {
            Self::Mode(ToolChoiceMode::None) => ToolPolicy::None,
            Self::Mode(ToolChoiceMode::Auto) => ToolPolicy::Auto,
            Self::Mode(ToolChoiceMode::Required) => ToolPolicy::Required,
            Self::Named(named) => ToolPolicy::Named(&named.function.name),
        }
    }
}

/// Tool selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    /// Model will not call any tools
    None,
    /// Model decides whether to call tools
    Auto,
    /// Model must call at least one tool
    Required,
}

/// Force the model to call a specific function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedToolChoice {
    /// Always "function"
    #[serde(rename = "type", default = "super::message::function_type")]
    pub choice_type: String,
    /// Function to call
    pub function: FunctionName,
}

/// Function name reference within a forced tool choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionName {
    /// Name of the function to call
    pub name: String,
}

/// Vendor-neutral tool-choice policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPolicy<'a> {
    /// Vendor decides
    Auto,
    /// At least one tool call is required
    Required,
    /// No tool calls; the field is omitted on the vendor side
    None,
    /// This tool must be called
    Named(&'a str),
}
