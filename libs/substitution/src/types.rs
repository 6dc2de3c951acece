//! Declarative substitution types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::SubstitutionError;

/// Stable logical name of one replica within a fleet.
///
/// Opaque to this crate; callers usually derive it from the replica
/// ordinal or name. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Create an identifier, rejecting empty strings.
    pub fn new(s: impl Into<String>) -> Result<Self, SubstitutionError> {
        let s = s.into();
        if s.is_empty() {
            return Err(SubstitutionError::EmptyIdentifier);
        }
        Ok(Self(s))
    }

    /// Get the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Identifier {
    type Err = SubstitutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = SubstitutionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// Property holding the CIDR an address is drawn from.
pub const CIDR_PROPERTY: &str = "cidr";

/// Property selecting the address allocation strategy.
pub const STRATEGY_PROPERTY: &str = "strategy";

/// A request to inject a generated value at a placeholder token.
///
/// Serialized the way fleet templates declare it:
///
/// ```json
/// {"type": "ipv4Address", "key": "$ipv4Address", "unique": true,
///  "additionalProperties": {"cidr": "10.0.0.0/24"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substitution {
    /// Handler kind (e.g., `ipv4Address`).
    #[serde(rename = "type")]
    pub type_name: String,

    /// Placeholder token replaced in the template.
    pub key: String,

    /// Whether the value must be distinct across the fleet.
    #[serde(default)]
    pub unique: bool,

    /// Handler-specific configuration.
    #[serde(default)]
    pub additional_properties: BTreeMap<String, String>,
}

impl Substitution {
    /// Create a non-unique substitution with no properties.
    pub fn new(type_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.into(),
            unique: false,
            additional_properties: BTreeMap::new(),
        }
    }

    /// Require the value to be distinct across the fleet.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set a handler-specific property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_properties.insert(name.into(), value.into());
        self
    }

    /// Get a handler-specific property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.additional_properties.get(name).map(|s| s.as_str())
    }

    /// Check the declaration is usable.
    pub fn validate(&self) -> Result<(), SubstitutionError> {
        if self.key.is_empty() {
            return Err(SubstitutionError::InvalidSubstitution {
                key: self.key.clone(),
                reason: "key cannot be empty".to_string(),
            });
        }
        if self.type_name.is_empty() {
            return Err(SubstitutionError::InvalidSubstitution {
                key: self.key.clone(),
                reason: "type cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// A resolved value recorded for one replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    /// Placeholder token.
    pub key: String,

    /// Value assigned to the token.
    pub value: String,
}

impl State {
    /// Create a new state entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
