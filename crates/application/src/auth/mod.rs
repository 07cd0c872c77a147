//! Auth resolver
//!
//! Turns a declarative [`AuthConfig`](courier_domain::AuthConfig) into the
//! header or query parameter that carries the credential.

mod resolver;

pub use resolver::{apply_query_auth, resolve};
