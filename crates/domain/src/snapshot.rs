//! Versioned persisted state.

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::cookie::CookieJar;
use crate::environment::Environment;
use crate::history::RequestHistory;
use crate::settings::Settings;

/// Everything that survives a restart. Tabs are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Schema version, see [`PersistedState::CURRENT_VERSION`]
    pub version: u32,
    /// Named environments
    #[serde(default)]
    pub environments: Vec<Environment>,
    /// Saved request collections
    #[serde(default)]
    pub collections: Vec<Collection>,
    /// Request history
    #[serde(default)]
    pub history: RequestHistory,
    /// Cookie jar
    #[serde(default)]
    pub cookies: CookieJar,
    /// Settings
    #[serde(default)]
    pub settings: Settings,
}

impl PersistedState {
    /// The schema version written by this build.
    pub const CURRENT_VERSION: u32 = 1;
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            environments: Vec::new(),
            collections: Vec::new(),
            history: RequestHistory::default(),
            cookies: CookieJar::default(),
            settings: Settings::default(),
        }
    }
}
