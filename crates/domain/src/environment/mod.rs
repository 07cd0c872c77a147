//! Environment and variable domain types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{EnvironmentId, generate_id};

/// A flat `key -> value` view of an environment's enabled variables.
pub type VariableSnapshot = BTreeMap<String, String>;

const fn default_enabled() -> bool {
    true
}

/// A single environment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    /// Variable name, referenced as `<<key>>`
    pub key: String,
    /// Variable value
    pub value: String,
    /// Disabled rows are ignored by substitution
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl EnvironmentVariable {
    /// Creates an enabled variable.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    /// Creates a disabled variable.
    #[must_use]
    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: false,
        }
    }
}

/// A named, ordered set of variables.
///
/// Keys may repeat across rows; the active snapshot keeps the last
/// enabled row for each key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Unique identifier
    pub id: EnvironmentId,
    /// Display name
    pub name: String,
    /// Variable rows in display order
    #[serde(default)]
    pub variables: Vec<EnvironmentVariable>,
}

impl Environment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            variables: Vec::new(),
        }
    }

    /// Adds an enabled variable row.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push(EnvironmentVariable::new(key, value));
        self
    }

    /// Returns the enabled variables as a flat map, last enabled row wins.
    #[must_use]
    pub fn snapshot(&self) -> VariableSnapshot {
        self.variables
            .iter()
            .filter(|v| v.enabled)
            .map(|v| (v.key.clone(), v.value.clone()))
            .collect()
    }

    /// Returns the effective value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .rev()
            .find(|v| v.enabled && v.key == key)
            .map(|v| v.value.as_str())
    }

    /// Writes `key = value` so that the snapshot observes it.
    ///
    /// Overwrites the row that currently wins for `key`, otherwise
    /// appends a new enabled row.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .variables
            .iter_mut()
            .rev()
            .find(|v| v.enabled && v.key == key)
        {
            Some(row) => row.value = value,
            None => self.variables.push(EnvironmentVariable::new(key, value)),
        }
    }

    /// Merges script updates into the environment.
    pub fn apply_updates(&mut self, updates: &VariableSnapshot) {
        for (key, value) in updates {
            self.set(key, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshot_last_enabled_wins() {
        let mut env = Environment::new("dev")
            .with_variable("host", "a.example")
            .with_variable("host", "b.example");
        env.variables
            .push(EnvironmentVariable::disabled("host", "c.example"));

        let snapshot = env.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["host"], "b.example");
        assert_eq!(env.get("host"), Some("b.example"));
    }

    #[test]
    fn test_disabled_keys_absent_from_snapshot() {
        let mut env = Environment::new("dev");
        env.variables.push(EnvironmentVariable::disabled("token", "x"));
        assert!(env.snapshot().is_empty());
        assert_eq!(env.get("token"), None);
    }

    #[test]
    fn test_set_overwrites_winning_row() {
        let mut env = Environment::new("dev")
            .with_variable("id", "1")
            .with_variable("id", "2");
        env.set("id", "3");

        assert_eq!(env.variables[0].value, "1");
        assert_eq!(env.variables[1].value, "3");
        assert_eq!(env.snapshot()["id"], "3");
    }

    #[test]
    fn test_apply_updates_appends_new_keys() {
        let mut env = Environment::new("dev").with_variable("id", "1");
        env.variables.push(EnvironmentVariable::disabled("token", "old"));

        let updates = VariableSnapshot::from([
            ("id".to_string(), "2".to_string()),
            ("token".to_string(), "new".to_string()),
        ]);
        env.apply_updates(&updates);

        assert_eq!(env.variables.len(), 3);
        assert_eq!(env.snapshot()["id"], "2");
        assert_eq!(env.snapshot()["token"], "new");
    }
}
