//! Stable JSON serialization for the state file.
//!
//! Output uses 2-space indentation and a trailing newline so saved state
//! diffs cleanly.

mod json;

pub use json::*;
