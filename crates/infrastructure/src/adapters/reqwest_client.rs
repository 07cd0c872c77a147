//! Transport implementation using reqwest.
//!
//! Cookies are never stored or replayed by the client: the only cookies
//! on the wire are the ones the pipeline put in the `Cookie` header.

use std::error::Error as _;
use std::time::Duration;

use courier_application::{
    EncodedBody, MultipartPart, Transport, TransportError, TransportRequest, TransportResponse,
};
use courier_domain::HttpMethod;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use tracing::debug;

/// Default timeout for one request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport backed by `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: String,
    max_redirects: usize,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: concat!("Courier/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 10,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets how many redirects are followed.
    #[must_use]
    pub const fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be created.
    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let client = Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .build()
            .map_err(|e| TransportError::new(describe(&e)))?;
        Ok(ReqwestTransport { client })
    }
}

impl ReqwestTransport {
    /// Creates a transport with default settings (30 second timeout, up
    /// to 10 redirects).
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    /// Starts configuring a transport.
    #[must_use]
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}

/// Builds a multipart form. File parts without a content type get one
/// guessed from their file name.
fn build_form(parts: Vec<MultipartPart>) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            MultipartPart::Text { name, value } => form.text(name, value),
            MultipartPart::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                let mime_type = content_type.unwrap_or_else(|| {
                    mime_guess::from_path(&file_name)
                        .first_or_octet_stream()
                        .to_string()
                });
                let part = Part::bytes(data)
                    .file_name(file_name)
                    .mime_str(&mime_type)
                    .map_err(|e| TransportError::new(format!("Invalid MIME type: {e}")))?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

/// Error text including every source, so the failure can be classified.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
            ..
        } = request;

        let mut builder = self.client.request(Self::to_reqwest_method(method), url);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        builder = match body {
            EncodedBody::Empty => builder,
            EncodedBody::Text(text) => builder.body(text),
            EncodedBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(describe(&e)))?;

        let status = response.status();
        let response_headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(format!("Failed to read body: {}", describe(&e))))?
            .to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "transport response");

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: response_headers,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use courier_application::pipeline::classify;
    use courier_domain::FailureCause;

    #[test]
    fn test_to_reqwest_method() {
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Get),
            Method::GET
        );
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Patch),
            Method::PATCH
        );
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Options),
            Method::OPTIONS
        );
    }

    #[test]
    fn test_builder_creates_transport() {
        let transport = ReqwestTransport::builder()
            .timeout(Duration::from_millis(500))
            .user_agent("test")
            .max_redirects(0)
            .build();
        assert!(transport.is_ok());
    }

    #[test]
    fn test_form_accepts_text_and_files() {
        let form = build_form(vec![
            MultipartPart::Text {
                name: "title".to_string(),
                value: "report".to_string(),
            },
            MultipartPart::File {
                name: "upload".to_string(),
                file_name: "report.pdf".to_string(),
                content_type: None,
                data: b"%PDF".to_vec(),
            },
        ]);
        assert!(form.is_ok());
    }

    #[test]
    fn test_form_rejects_bad_mime() {
        let err = build_form(vec![MultipartPart::File {
            name: "upload".to_string(),
            file_name: "a.bin".to_string(),
            content_type: Some("not a mime".to_string()),
            data: Vec::new(),
        }])
        .unwrap_err();
        assert!(err.message.starts_with("Invalid MIME type"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_classified_as_network() {
        let transport = ReqwestTransport::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let request = TransportRequest {
            method: HttpMethod::Get,
            url: "http://127.0.0.1:9/".parse().unwrap(),
            headers: Vec::new(),
            body: EncodedBody::Empty,
            forward_credentials: false,
        };
        let err = transport.send(request).await.unwrap_err();
        assert_eq!(classify(&err.message), FailureCause::Network);
    }
}
