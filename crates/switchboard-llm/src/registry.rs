//! Adapter registry and model dispatch
//!
//! The set of known vendors is static and ordered. Active adapters are built
//! from a credential snapshot; a request goes to the first active adapter
//! declaring its model.

use std::sync::Arc;

use switchboard_config::Credentials;

use crate::adapter::{
    Adapter, AdapterContext, anthropic, cohere, google, openai, openai_compat, vertex,
};
use crate::error::LlmError;
use crate::types::{ModelCard, ModelList};

type Build = fn(&Credentials, &AdapterContext) -> anyhow::Result<Arc<dyn Adapter>>;

/// A vendor known to the gateway
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    /// Adapter name
    pub name: &'static str,
    /// Keys that must all be present for the adapter to be active
    pub required_keys: &'static [&'static str],
    /// Keys the adapter reads when present
    pub optional_keys: &'static [&'static str],
    build: Build,
}

macro_rules! build {
    ($ctor:expr) => {
        |credentials, context| Ok(Arc::new($ctor(credentials, context)?) as Arc<dyn Adapter>)
    };
}

/// Every vendor, in dispatch priority order
pub static REGISTRY: &[Registration] = &[
    Registration {
        name: "openai",
        required_keys: openai::REQUIRED_KEYS,
        optional_keys: openai::OPTIONAL_KEYS,
        build: build!(openai::OpenAiAdapter::new),
    },
    Registration {
        name: "anthropic",
        required_keys: anthropic::REQUIRED_KEYS,
        optional_keys: anthropic::OPTIONAL_KEYS,
        build: build!(anthropic::AnthropicAdapter::new),
    },
    Registration {
        name: "vertex-anthropic",
        required_keys: vertex::REQUIRED_KEYS,
        optional_keys: vertex::OPTIONAL_KEYS,
        build: build!(vertex::VertexAnthropicAdapter::new),
    },
    Registration {
        name: "google",
        required_keys: google::REQUIRED_KEYS,
        optional_keys: google::OPTIONAL_KEYS,
        build: build!(google::GoogleAdapter::new),
    },
    Registration {
        name: "deepseek",
        required_keys: openai_compat::DEEPSEEK_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::deepseek),
    },
    Registration {
        name: "moonshot",
        required_keys: openai_compat::MOONSHOT_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::moonshot),
    },
    Registration {
        name: "lingyiwanwu",
        required_keys: openai_compat::LINGYIWANWU_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::lingyiwanwu),
    },
    Registration {
        name: "groq",
        required_keys: openai_compat::GROQ_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::groq),
    },
    Registration {
        name: "azure",
        required_keys: openai_compat::AZURE_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::azure),
    },
    Registration {
        name: "cohere",
        required_keys: cohere::REQUIRED_KEYS,
        optional_keys: cohere::OPTIONAL_KEYS,
        build: build!(cohere::CohereAdapter::new),
    },
    Registration {
        name: "bailian",
        required_keys: openai_compat::BAILIAN_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::bailian),
    },
    Registration {
        name: "ollama",
        required_keys: openai_compat::OLLAMA_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::ollama),
    },
    Registration {
        name: "grok",
        required_keys: openai_compat::GROK_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::grok),
    },
    Registration {
        name: "openrouter",
        required_keys: openai_compat::OPENROUTER_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::openrouter),
    },
    Registration {
        name: "cerebras",
        required_keys: openai_compat::CEREBRAS_KEYS,
        optional_keys: openai_compat::OPTIONAL_KEYS,
        build: build!(openai_compat::cerebras),
    },
];

/// Every configuration key some adapter reads, deduplicated
pub fn credential_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = Vec::new();
    for key in REGISTRY
        .iter()
        .flat_map(|entry| entry.required_keys.iter().chain(entry.optional_keys))
    {
        if !keys.contains(key) {
            keys.push(key);
        }
    }
    keys
}

/// Build the adapters whose required keys are all present, in registry order
///
/// An adapter whose credentials are present but invalid (an unparseable URL
/// or private key) is logged and left out.
pub fn list_adapters(credentials: &Credentials, context: &AdapterContext) -> Vec<Arc<dyn Adapter>> {
    REGISTRY
        .iter()
        .filter(|entry| credentials.contains_all(entry.required_keys))
        .filter_map(|entry| match (entry.build)(credentials, context) {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                tracing::warn!(vendor = entry.name, error = %e, "skipping misconfigured adapter");
                None
            }
        })
        .collect()
}

/// The first adapter declaring `model`
pub fn dispatch<'a>(model: &str, adapters: &'a [Arc<dyn Adapter>]) -> Result<&'a Arc<dyn Adapter>, LlmError> {
    let adapter = adapters
        .iter()
        .find(|adapter| adapter.supports(model))
        .ok_or_else(|| LlmError::UnsupportedModel {
            model: model.to_owned(),
        })?;

    tracing::debug!(model, vendor = adapter.name(), "dispatching request");
    Ok(adapter)
}

/// Model cards for every model the adapters serve
///
/// A model declared by several adapters is listed once, under the adapter
/// that would serve it.
pub fn list_models(adapters: &[Arc<dyn Adapter>]) -> ModelList {
    let created = crate::types::unix_now();
    let mut cards: Vec<ModelCard> = Vec::new();

    for adapter in adapters {
        for model in adapter.models() {
            if cards.iter().any(|card| &card.id == model) {
                continue;
            }
            cards.push(ModelCard {
                id: model.clone(),
                object: "model".to_owned(),
                created,
                owned_by: adapter.name().to_owned(),
            });
        }
    }

    ModelList::new(cards)
}
