//! Response specification type
//!
//! Contains the parsed response stored on a tab, including the decoded
//! body, timing and size information.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::sandbox::ResponseSnapshot;

/// HTTP status code with semantic helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// Creates a new `StatusCode`.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns true if this is a 2xx success status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns the canonical reason phrase for common status codes.
    #[must_use]
    pub const fn reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            409 => "Conflict",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// A response body decoded according to its content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResponseBody {
    /// Structured JSON document.
    Json {
        /// The decoded document
        value: Value,
    },
    /// Text payload.
    Text {
        /// The payload as (lossy) UTF-8
        text: String,
    },
    /// Binary payload captured as base64.
    Binary {
        /// Base64 encoded bytes
        data: String,
        /// Always true, marks the envelope for consumers
        #[serde(rename = "isBase64")]
        is_base64: bool,
    },
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::Text {
            text: String::new(),
        }
    }
}

impl ResponseBody {
    /// Wraps base64 data in a binary envelope.
    #[must_use]
    pub fn binary(data_base64: impl Into<String>) -> Self {
        Self::Binary {
            data: data_base64.into(),
            is_base64: true,
        }
    }

    /// Returns the value scripts see as the response body.
    #[must_use]
    pub fn to_script_value(&self) -> Value {
        match self {
            Self::Json { value } => value.clone(),
            Self::Text { text } => Value::String(text.clone()),
            Self::Binary { data, is_base64 } => json!({ "isBase64": is_base64, "data": data }),
        }
    }

    /// Returns the body rendered as text.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Json { value } => value.to_string(),
            Self::Text { text } => text.clone(),
            Self::Binary { data, .. } => data.clone(),
        }
    }

    /// Size of the body after re-serializing the decoded value.
    ///
    /// This is not the wire size: JSON is re-encoded compactly and binary
    /// payloads are measured in base64 characters.
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        match self {
            Self::Json { value } => value.to_string().len(),
            Self::Text { text } => text.len(),
            Self::Binary { data, .. } => data.len(),
        }
    }
}

/// HTTP response stored on a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    /// HTTP status code.
    pub status: u16,
    /// Status text (e.g., "OK", "Not Found")
    pub status_text: String,
    /// Response headers, lower-cased names, repeated values joined by `, `
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Decoded body.
    pub body: ResponseBody,
    /// Content-Type header value (extracted for convenience).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Time spent in the transport, in milliseconds.
    pub elapsed_ms: u64,
    /// Body size, see [`ResponseBody::serialized_len`].
    pub size_bytes: usize,
}

impl ResponseSpec {
    /// Returns the status as a `StatusCode`.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        StatusCode::new(self.status)
    }

    /// Returns true if the status code indicates success (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code().is_success()
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Builds the read-only view handed to test scripts.
    #[must_use]
    pub fn snapshot(&self) -> ResponseSnapshot {
        ResponseSnapshot {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.to_script_value(),
        }
    }
}
