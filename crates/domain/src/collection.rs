//! Saved request collections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::{CollectionId, generate_id};
use crate::request::ApiRequest;

/// A request saved into a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRequest {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// The stored request, placeholders intact
    pub request: ApiRequest,
}

/// A named group of saved requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Unique identifier
    pub id: CollectionId,
    /// Display name
    pub name: String,
    /// Saved requests in display order
    #[serde(default)]
    pub requests: Vec<SavedRequest>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            requests: Vec::new(),
        }
    }

    /// Saves a request and returns its id.
    pub fn save(&mut self, name: impl Into<String>, request: ApiRequest) -> Uuid {
        let saved = SavedRequest {
            id: generate_id(),
            name: name.into(),
            request,
        };
        let id = saved.id;
        self.requests.push(saved);
        id
    }

    /// Looks up a saved request.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&SavedRequest> {
        self.requests.iter().find(|r| r.id == id)
    }
}
