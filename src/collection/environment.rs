//! Template environment: collection data plus external overrides

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// Variables visible to `{{ _.NAME }}` templates.
///
/// `data` comes from the collection; `overrides` are supplied externally
/// (dotenv file, `--var`) and win on lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    pub name: String,
    data: IndexMap<String, JsonValue>,
    overrides: IndexMap<String, JsonValue>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build an environment from base data only
    pub fn from_data(name: impl Into<String>, data: IndexMap<String, JsonValue>) -> Self {
        Self {
            name: name.into(),
            data,
            overrides: IndexMap::new(),
        }
    }

    /// Layer more collection data on top (used for sub-environments)
    pub fn extend_data(&mut self, data: IndexMap<String, JsonValue>) {
        self.data.extend(data);
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn set_override(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.overrides.insert(key.into(), value.into());
    }

    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<JsonValue>,
    {
        for (key, value) in overrides {
            self.overrides.insert(key.into(), value.into());
        }
        self
    }

    /// Look a variable up, override first, and render it as text
    pub fn get(&self, key: &str) -> Option<String> {
        self.overrides
            .get(key)
            .or_else(|| self.data.get(key))
            .map(stringify)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.overrides.contains_key(key) || self.data.contains_key(key)
    }

    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Union of base and override keys, base order first
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.data.keys().map(String::as_str).collect();
        for key in self.overrides.keys() {
            if !self.data.contains_key(key) {
                keys.push(key);
            }
        }
        keys
    }

    /// All variables with their effective values
    pub fn all(&self) -> Vec<(String, String)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.overrides.is_empty()
    }
}

/// Text form of an environment value
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
