//! HTTP request domain types

mod body;
mod header;
mod method;
mod spec;

pub use body::{FormField, MultipartField, RequestBody};
pub use header::{Header, QueryParam};
pub use method::HttpMethod;
pub use spec::ApiRequest;
