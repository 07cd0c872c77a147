//! Persisted state storage.
//!
//! The snapshot lives in the platform-specific config directory unless a
//! path is given explicitly:
//! - Linux: ~/.config/courier/state.json
//! - macOS: ~/Library/Application Support/courier/state.json
//! - Windows: %APPDATA%/courier/state.json

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use courier_application::{ApplicationError, ApplicationResult, StateRepository};
use courier_domain::PersistedState;
use tokio::fs;
use tracing::{debug, info};

use crate::serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};

/// Error type for state file operations.
#[derive(Debug, thiserror::Error)]
pub enum StateRepositoryError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// The file was written by a newer or unknown schema.
    #[error("Unsupported state version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Version this build reads
        expected: u32,
    },

    /// Could not determine config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,
}

impl From<StateRepositoryError> for ApplicationError {
    fn from(err: StateRepositoryError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Loads and saves [`PersistedState`] as stable, pretty JSON.
#[derive(Debug, Clone)]
pub struct FileStateRepository {
    path: PathBuf,
}

impl FileStateRepository {
    /// Creates a repository backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a repository at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no config directory.
    pub fn in_config_dir() -> Result<Self, StateRepositoryError> {
        Self::default_path()
            .map(Self::new)
            .ok_or(StateRepositoryError::NoConfigDir)
    }

    /// Returns `<config dir>/courier/state.json`, if available.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("courier").join("state.json"))
    }

    /// Returns the file this repository reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// carries an unsupported version.
    pub async fn read(&self) -> Result<PersistedState, StateRepositoryError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved state, using defaults");
                return Ok(PersistedState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let state: PersistedState = from_json_bytes(&content)?;
        if state.version != PersistedState::CURRENT_VERSION {
            return Err(StateRepositoryError::UnsupportedVersion {
                found: state.version,
                expected: PersistedState::CURRENT_VERSION,
            });
        }
        Ok(state)
    }

    /// Writes the snapshot, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn write(&self, state: &PersistedState) -> Result<(), StateRepositoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = to_json_stable_bytes(state)?;
        fs::write(&self.path, content).await?;
        info!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

#[async_trait]
impl StateRepository for FileStateRepository {
    async fn load(&self) -> ApplicationResult<PersistedState> {
        Ok(self.read().await?)
    }

    async fn save(&self, state: &PersistedState) -> ApplicationResult<()> {
        Ok(self.write(state).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use courier_domain::Environment;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_path_is_under_courier() {
        if let Some(path) = FileStateRepository::default_path() {
            assert!(path.ends_with("courier/state.json"));
        }
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let repo = FileStateRepository::new(dir.path().join("state.json"));
        assert_eq!(repo.load().await.unwrap(), PersistedState::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let repo = FileStateRepository::new(dir.path().join("nested").join("state.json"));

        let mut state = PersistedState::default();
        state
            .environments
            .push(Environment::new("dev").with_variable("host", "api.dev"));
        state.settings.max_history_size = 10;

        repo.save(&state).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), state);

        let text = std::fs::read_to_string(repo.path()).unwrap();
        assert!(text.starts_with("{\n  \"version\": 1"));
        assert!(text.ends_with("}\n"));
    }

    #[tokio::test]
    async fn test_unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version": 99}"#).unwrap();

        let err = FileStateRepository::new(&path).read().await.unwrap_err();
        assert!(matches!(
            err,
            StateRepositoryError::UnsupportedVersion { found: 99, expected: 1 }
        ));
        assert!(matches!(
            FileStateRepository::new(&path).load().await.unwrap_err(),
            ApplicationError::Storage(_)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileStateRepository::new(&path).read().await.unwrap_err();
        assert!(matches!(err, StateRepositoryError::Serialization(_)));
    }
}
