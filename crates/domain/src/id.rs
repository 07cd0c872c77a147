//! Identifier types.
//!
//! Entities reference each other by id and are resolved through lookup
//! tables owned by the store; nothing embeds another entity.

use uuid::Uuid;

/// Identifier of a request tab.
pub type TabId = Uuid;

/// Identifier of a named environment.
pub type EnvironmentId = Uuid;

/// Identifier of a collection.
pub type CollectionId = Uuid;

/// Generates a new time-ordered (v7) identifier.
#[must_use]
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}
