//! Substitution engine
//!
//! Provides parsing and single-pass resolution of `<<key>>` placeholders.
//!
//! # Usage
//!
//! ```
//! use courier_application::variable_resolver::substitute;
//! use courier_domain::Environment;
//!
//! let env = Environment::new("development").with_variable("host", "localhost");
//! assert_eq!(substitute("http://<<host>>/api", &env.snapshot()), "http://localhost/api");
//! ```

pub mod engine;
pub mod parser;

pub use engine::{substitute, substitute_request, unresolved_keys};
pub use parser::{Placeholder, parse_placeholders};
