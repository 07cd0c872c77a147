//! User settings domain model.

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_MAX_HISTORY;
use crate::id::EnvironmentId;

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Environment used by tabs without an override.
    #[serde(default)]
    pub active_environment_id: Option<EnvironmentId>,

    /// Maximum number of history entries to keep.
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,

    /// Whether completed sends are appended to history.
    #[serde(default = "default_auto_save_history")]
    pub auto_save_history: bool,
}

const fn default_max_history_size() -> usize {
    DEFAULT_MAX_HISTORY
}

const fn default_auto_save_history() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_environment_id: None,
            max_history_size: default_max_history_size(),
            auto_save_history: default_auto_save_history(),
        }
    }
}
