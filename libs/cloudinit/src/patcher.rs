//! Cloud-config patcher.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::CloudInitError;

/// Header line every cloud-config document starts with.
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

/// Top-level key holding environment variables.
pub const ENVIRONMENT_KEY: &str = "environment";

/// In-memory, mutable view of one cloud-config document.
///
/// Built from a resource's user-data, patched, rendered and discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudInitPatcher {
    /// Base64 user-data as received.
    raw: String,

    /// Decoded document text as received.
    decoded: String,

    /// Parsed top-level mapping.
    document: Mapping,
}

impl CloudInitPatcher {
    /// Decode base64 user-data and parse it as cloud-config.
    ///
    /// Empty user-data yields an empty document.
    pub fn new(raw: &str) -> Result<Self, CloudInitError> {
        let bytes = STANDARD.decode(raw.trim())?;
        let decoded = String::from_utf8(bytes)?;
        let document = parse_document(&decoded)?;

        Ok(Self {
            raw: raw.to_string(),
            decoded,
            document,
        })
    }

    /// Parse already-decoded cloud-config text.
    pub fn from_document(text: &str) -> Result<Self, CloudInitError> {
        let document = parse_document(text)?;

        Ok(Self {
            raw: STANDARD.encode(text),
            decoded: text.to_string(),
            document,
        })
    }

    /// Set a top-level key, replacing any previous value.
    pub fn patch(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        debug!(key, "patching cloud-config key");
        self.document.insert(Value::from(key), value);
        self
    }

    /// Get a top-level value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Remove a top-level key, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.document.remove(key)
    }

    /// Set a variable in the `environment` mapping, creating it if needed.
    pub fn set_env(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let env = self
            .document
            .entry(Value::from(ENVIRONMENT_KEY))
            .or_insert_with(|| Value::Mapping(Mapping::new()));

        if !env.is_mapping() {
            warn!(key, "replacing non-mapping environment value");
            *env = Value::Mapping(Mapping::new());
        }

        if let Value::Mapping(env) = env {
            env.insert(Value::from(key), value.into());
        }
        self
    }

    /// Get a variable from the `environment` mapping.
    pub fn get_env(&self, key: &str) -> Option<&Value> {
        self.document
            .get(ENVIRONMENT_KEY)
            .and_then(Value::as_mapping)
            .and_then(|env| env.get(key))
    }

    /// Rewrite every string scalar in the document, mapping keys included.
    ///
    /// Rewritten values stay strings, whatever they look like.
    pub fn map_strings<F>(&mut self, mut rewrite: F) -> &mut Self
    where
        F: FnMut(&str) -> String,
    {
        let document = std::mem::take(&mut self.document);
        self.document = map_mapping(document, &mut rewrite);
        self
    }

    /// Top-level keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.document.keys().filter_map(Value::as_str)
    }

    /// Check if the document has no keys.
    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// The base64 user-data this patcher was built from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The decoded text this patcher was built from.
    pub fn decoded(&self) -> &str {
        &self.decoded
    }

    /// Render the current document as cloud-config text.
    pub fn render(&self) -> Result<String, CloudInitError> {
        let body = serde_yaml::to_string(&self.document)
            .map_err(|e| CloudInitError::Marshal(e.to_string()))?;

        let mut out = String::with_capacity(CLOUD_CONFIG_HEADER.len() + 1 + body.len());
        out.push_str(CLOUD_CONFIG_HEADER);
        out.push('\n');
        out.push_str(&body);
        Ok(out)
    }

    /// Render and base64-encode the current document.
    pub fn encode(&self) -> Result<String, CloudInitError> {
        Ok(STANDARD.encode(self.render()?))
    }
}

fn map_mapping<F: FnMut(&str) -> String>(mapping: Mapping, rewrite: &mut F) -> Mapping {
    mapping
        .into_iter()
        .map(|(key, value)| (map_value(key, rewrite), map_value(value, rewrite)))
        .collect()
}

fn map_value<F: FnMut(&str) -> String>(value: Value, rewrite: &mut F) -> Value {
    match value {
        Value::String(text) => Value::String(rewrite(&text)),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| map_value(item, rewrite))
                .collect(),
        ),
        Value::Mapping(mapping) => Value::Mapping(map_mapping(mapping, rewrite)),
        Value::Tagged(mut tagged) => {
            tagged.value = map_value(std::mem::take(&mut tagged.value), rewrite);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

/// Validate the header and parse the document body.
fn parse_document(text: &str) -> Result<Mapping, CloudInitError> {
    let Some(first_line) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(Mapping::new());
    };

    if first_line != CLOUD_CONFIG_HEADER {
        return Err(CloudInitError::NoCloudConfig {
            first_line: first_line.chars().take(64).collect(),
        });
    }

    let value: Value =
        serde_yaml::from_str(text).map_err(|e| CloudInitError::MalformedData(e.to_string()))?;

    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(CloudInitError::MalformedData(format!(
            "expected a mapping at the document root, got {}",
            value_kind(&other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
