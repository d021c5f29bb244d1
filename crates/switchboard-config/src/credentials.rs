//! Immutable snapshot of vendor credentials and endpoints

use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};

use crate::Config;

/// Configuration keys available to vendor adapters
///
/// Captured once from the process environment and the `[credentials]`
/// table; never mutated afterwards. Empty values are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    values: BTreeMap<String, SecretString>,
}

impl Credentials {
    /// Build a snapshot from explicit key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), SecretString::from(v.into())))
            .collect();

        Self { values }
    }

    /// Capture the given keys from the process environment
    pub fn from_env<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self::from_pairs(
            keys.into_iter()
                .filter_map(|key| std::env::var(key).ok().map(|value| (key, value))),
        )
    }

    /// Look up a non-empty value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.expose_secret())
            .filter(|value| !value.is_empty())
    }

    /// Whether a non-empty value is present for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether every key in `keys` is present
    pub fn contains_all(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.contains(key))
    }

    /// Return a new snapshot where `other` wins on conflicting keys
    #[must_use]
    pub fn overlay<'a>(mut self, other: impl IntoIterator<Item = (&'a String, &'a SecretString)>) -> Self {
        for (key, value) in other {
            self.values.insert(key.clone(), value.clone());
        }
        self
    }
}

impl Config {
    /// Snapshot the credentials adapters may use
    ///
    /// `keys` lists the environment variables worth capturing; the
    /// `[credentials]` table is applied on top of them.
    pub fn credentials<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Credentials {
        Credentials::from_env(keys).overlay(&self.credentials)
    }
}
