//! HTTP request body types

use serde::{Deserialize, Serialize};

const fn default_enabled() -> bool {
    true
}

/// A key/value row of a url-encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Field name
    pub key: String,
    /// Field value
    pub value: String,
    /// Whether the field is serialized
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl FormField {
    /// Creates an enabled form field.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// A part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MultipartField {
    /// Plain text part.
    Text {
        /// Part name
        key: String,
        /// Part value
        value: String,
        /// Whether the part is emitted
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
    /// Binary file part. The file content travels base64-encoded.
    #[serde(rename_all = "camelCase")]
    File {
        /// Part name
        key: String,
        /// File name reported to the server
        file_name: String,
        /// Explicit MIME type; guessed from `file_name` when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        /// Base64 encoded file content
        data: String,
        /// Whether the part is emitted
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
}

impl MultipartField {
    /// Creates an enabled text part.
    #[must_use]
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    /// Creates an enabled file part from base64 content.
    #[must_use]
    pub fn file(
        key: impl Into<String>,
        file_name: impl Into<String>,
        data_base64: impl Into<String>,
    ) -> Self {
        Self::File {
            key: key.into(),
            file_name: file_name.into(),
            content_type: None,
            data: data_base64.into(),
            enabled: true,
        }
    }

    /// Returns whether this part is emitted.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        match self {
            Self::Text { enabled, .. } | Self::File { enabled, .. } => *enabled,
        }
    }
}

/// Typed request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RequestBody {
    /// No body
    #[default]
    None,
    /// JSON text, sent as-is
    Json {
        /// The JSON document
        content: String,
    },
    /// Raw text with an optional declared content type
    #[serde(rename_all = "camelCase")]
    Raw {
        /// The payload
        content: String,
        /// Declared content type, e.g. `text/plain`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
    /// `application/x-www-form-urlencoded` fields
    UrlEncoded {
        /// Form rows, disabled ones are skipped
        fields: Vec<FormField>,
    },
    /// `multipart/form-data` parts
    Multipart {
        /// Parts, disabled ones are skipped
        fields: Vec<MultipartField>,
    },
}

impl RequestBody {
    /// Creates a JSON body.
    #[must_use]
    pub fn json(content: impl Into<String>) -> Self {
        Self::Json {
            content: content.into(),
        }
    }

    /// Creates a raw body with a declared content type.
    #[must_use]
    pub fn raw(content: impl Into<String>, content_type: Option<String>) -> Self {
        Self::Raw {
            content: content.into(),
            content_type,
        }
    }

    /// Returns true for [`RequestBody::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the content type implied by the body kind.
    ///
    /// Multipart returns `None`: the transport must generate the boundary.
    #[must_use]
    pub fn implied_content_type(&self) -> Option<&str> {
        match self {
            Self::None | Self::Multipart { .. } => None,
            Self::Json { .. } => Some("application/json"),
            Self::Raw { content_type, .. } => content_type.as_deref(),
            Self::UrlEncoded { .. } => Some("application/x-www-form-urlencoded"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_body() {
        let body = RequestBody::json(r#"{"key": "value"}"#);
        assert_eq!(body.implied_content_type(), Some("application/json"));
        assert!(!body.is_none());
    }

    #[test]
    fn test_multipart_has_no_implied_content_type() {
        let body = RequestBody::Multipart {
            fields: vec![MultipartField::text("a", "b")],
        };
        assert_eq!(body.implied_content_type(), None);
    }

    #[test]
    fn test_body_wire_shape() {
        let body: RequestBody = serde_json::from_str(
            r#"{"type":"multipart","fields":[{"kind":"file","key":"f","fileName":"a.png","data":"AA=="}]}"#,
        )
        .unwrap();
        let RequestBody::Multipart { fields } = body else {
            unreachable!("expected multipart body");
        };
        assert!(fields[0].is_enabled());
    }
}
