//! Request specification type

use serde::{Deserialize, Serialize};

use super::{Header, HttpMethod, QueryParam, RequestBody};
use crate::auth::AuthConfig;
use crate::sandbox::Script;

/// The editable request owned by exactly one tab.
///
/// Every string field may contain `<<KEY>>` placeholders; they are resolved
/// by the pipeline at send time and never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    /// HTTP method
    #[serde(default)]
    pub method: HttpMethod,
    /// Target URL, absolute or scheme-less
    #[serde(default)]
    pub url: String,
    /// Header rows
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Query parameter rows, appended to the URL
    #[serde(default)]
    pub query_params: Vec<QueryParam>,
    /// Request body
    #[serde(default)]
    pub body: RequestBody,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Script run before substitution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_request_script: Option<Script>,
    /// Script run against the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_script: Option<Script>,
}

impl ApiRequest {
    /// Creates a request with the given method and URL.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Adds a header row.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Adds a query parameter row.
    #[must_use]
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(QueryParam::new(key, value));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Sets the auth configuration.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the pre-request script.
    #[must_use]
    pub fn with_pre_request_script(mut self, script: Script) -> Self {
        self.pre_request_script = Some(script);
        self
    }

    /// Sets the test script.
    #[must_use]
    pub fn with_test_script(mut self, script: Script) -> Self {
        self.test_script = Some(script);
        self
    }

    /// Returns enabled headers in declaration order.
    pub fn enabled_headers(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter().filter(|h| h.enabled)
    }

    /// Returns enabled query parameters in declaration order.
    pub fn enabled_query_params(&self) -> impl Iterator<Item = &QueryParam> {
        self.query_params.iter().filter(|p| p.enabled)
    }

    /// Short label used for tab titles and history, e.g. `GET api.example/users`.
    #[must_use]
    pub fn label(&self) -> String {
        let url = self
            .url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        if url.is_empty() {
            format!("{} Untitled", self.method)
        } else {
            format!("{} {url}", self.method)
        }
    }
}
