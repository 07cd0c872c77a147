//! Transport port
//!
//! The transport performs the actual network call. It is governed by the
//! platform's cross-origin policy, which is not reimplemented here.

use std::future::Future;

use courier_domain::request::HttpMethod;
use thiserror::Error;
use url::Url;

/// One part of an encoded multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    /// Plain text field.
    Text {
        /// Part name
        name: String,
        /// Part value
        value: String,
    },
    /// Binary file field.
    File {
        /// Part name
        name: String,
        /// File name reported to the server
        file_name: String,
        /// Explicit MIME type, guessed by the transport when absent
        content_type: Option<String>,
        /// Raw file bytes
        data: Vec<u8>,
    },
}

/// A request body ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EncodedBody {
    /// No body.
    #[default]
    Empty,
    /// Text payload (raw, JSON or url-encoded form).
    Text(String),
    /// Multipart parts; the transport generates the boundary and content type.
    Multipart(Vec<MultipartPart>),
}

/// A fully resolved request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL including query parameters
    pub url: Url,
    /// Headers in send order
    pub headers: Vec<(String, String)>,
    /// Encoded body
    pub body: EncodedBody,
    /// Whether ambient credentials (cookie store, auth cache) may be used.
    ///
    /// Always false: cookies travel only through the explicit `Cookie` header.
    pub forward_credentials: bool,
}

impl TransportRequest {
    /// Returns the first header value with the given name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw response as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportResponse {
    /// Status code
    pub status: u16,
    /// Status text, may be empty
    pub status_text: String,
    /// Headers as received, repeated names kept
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

/// A transport failure. The message text is what gets classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Error text as reported by the transport
    pub message: String,
}

impl TransportError {
    /// Creates a transport error from its message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Port for executing HTTP requests.
///
/// This trait abstracts the HTTP client implementation, allowing
/// the application layer to be independent of specific HTTP libraries.
pub trait Transport: Send + Sync {
    /// Sends the request once. Implementations never retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails due to network issues,
    /// cross-origin rejection, or other transport problems.
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}
