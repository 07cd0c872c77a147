//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod clock;
mod sandbox;
mod state_repository;
mod transport;

pub use clock::Clock;
pub use sandbox::ScriptSandbox;
pub use state_repository::StateRepository;
pub use transport::{
    EncodedBody, MultipartPart, Transport, TransportError, TransportRequest, TransportResponse,
};
