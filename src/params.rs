//! Flat key/value parameters attached to a filter configuration.
//!
//! Loading parameters from disk or a settings store is out of scope for the
//! core; this is only the in-memory shape that filters report and consume.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A flat, ordered key/value parameter set.
///
/// # Example
///
/// ```rust
/// use locfilter::Parameters;
///
/// let mut params = Parameters::new();
/// params.set("subFormat", "paragraphs");
/// params.set("extractPlaceholders", "true");
/// assert_eq!(params.get("subFormat"), Some("paragraphs"));
/// assert_eq!(params.get_bool("extractPlaceholders"), Some(true));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, String>);

impl Parameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    /// Reads a boolean parameter; accepts `true`/`false`/`1`/`0`
    /// (case-insensitive). Returns `None` when absent or unparseable.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)?.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Parameters(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
