//! Infrastructure adapters

mod reqwest_client;
mod system_clock;

pub use reqwest_client::{DEFAULT_REQUEST_TIMEOUT, ReqwestTransport, ReqwestTransportBuilder};
pub use system_clock::SystemClock;
