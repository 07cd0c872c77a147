//! Persistence implementations for file-based storage.

mod state_repository;

pub use state_repository::*;
