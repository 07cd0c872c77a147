//! Persisted state port

use async_trait::async_trait;
use courier_domain::PersistedState;

use crate::ApplicationResult;

/// Port for loading and saving the versioned state snapshot.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Loads the snapshot, returning defaults when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored snapshot cannot be read or has an
    /// unsupported version.
    async fn load(&self) -> ApplicationResult<PersistedState>;

    /// Saves the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    async fn save(&self, state: &PersistedState) -> ApplicationResult<()>;
}
