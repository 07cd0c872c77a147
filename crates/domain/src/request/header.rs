//! Header and query parameter rows

use serde::{Deserialize, Serialize};

const fn default_enabled() -> bool {
    true
}

/// A single HTTP header row as edited in a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// The header name (e.g., "Content-Type")
    pub name: String,
    /// The header value, may contain `<<KEY>>` placeholders
    pub value: String,
    /// Whether this header is sent
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Header {
    /// Creates a new enabled header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
        }
    }

    /// Creates a new disabled header.
    #[must_use]
    pub fn disabled(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: false,
        }
    }

    /// Returns true if this header has the given name (case-insensitive).
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A query parameter row. Both key and value may contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    /// The parameter key
    pub key: String,
    /// The parameter value
    pub value: String,
    /// Whether this parameter is appended to the URL
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl QueryParam {
    /// Creates a new enabled query parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    /// Creates a disabled query parameter.
    #[must_use]
    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: false,
        }
    }
}
