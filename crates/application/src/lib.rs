//! Courier Application - Use cases and ports
//!
//! This crate defines the application layer with:
//! - Port traits (transport, script sandbox, persisted state, clock)
//! - The substitution engine and auth resolver
//! - The request pipeline that orchestrates one send
//! - The store that owns tabs, environments, collections and history

pub mod auth;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod store;
pub mod variable_resolver;

pub use error::{ApplicationError, ApplicationResult};
pub use pipeline::{
    DEFAULT_SCRIPT_TIMEOUT, PipelineConfig, PipelineError, PipelineOutcome, RequestPipeline,
};
pub use ports::{
    Clock, EncodedBody, MultipartPart, ScriptSandbox, StateRepository, Transport, TransportError,
    TransportRequest, TransportResponse,
};
pub use store::{Store, StoreEvent};
pub use variable_resolver::substitute;
