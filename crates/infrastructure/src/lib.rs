//! Courier Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer:
//! - [`ReqwestTransport`] for HTTP
//! - [`IsolateSandbox`] for user scripts
//! - [`FileStateRepository`] for the persisted snapshot
//! - [`SystemClock`]

pub mod adapters;
pub mod persistence;
pub mod scripting;
pub mod serialization;

pub use adapters::{DEFAULT_REQUEST_TIMEOUT, ReqwestTransport, ReqwestTransportBuilder, SystemClock};
pub use persistence::{FileStateRepository, StateRepositoryError};
pub use scripting::{IsolateSandbox, ParseError, parse_script};
pub use serialization::{
    SerializationError, from_json, from_json_bytes, to_json_stable, to_json_stable_bytes,
};
