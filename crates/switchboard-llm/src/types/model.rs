use serde::{Deserialize, Serialize};

/// Response body of the list-models operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    /// Always "list"
    pub object: String,
    /// Available models
    pub data: Vec<ModelCard>,
}

impl ModelList {
    /// Wrap model cards in a list envelope
    pub fn new(data: Vec<ModelCard>) -> Self {
        Self {
            object: "list".to_owned(),
            data,
        }
    }
}

/// One servable model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCard {
    /// Model identifier accepted by chat completions
    pub id: String,
    /// Always "model"
    pub object: String,
    /// Unix timestamp of the listing
    pub created: u64,
    /// Name of the adapter serving this model
    pub owned_by: String,
}
