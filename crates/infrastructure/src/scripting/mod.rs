//! Script execution infrastructure.
//!
//! Scripts are parsed into declarative instructions and evaluated inside a
//! throwaway task, see [`IsolateSandbox`].

mod executor;
mod interpreter;
mod parser;

pub use executor::IsolateSandbox;
pub use interpreter::{Interpreter, RESERVED_KEYS, Thrown};
pub use parser::{ParseError, parse_script};
