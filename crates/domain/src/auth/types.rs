//! Authentication configuration types

use serde::{Deserialize, Serialize};

/// Authentication configuration for a request.
///
/// Exactly one mechanism applies per request; there is no inheritance
/// from enclosing collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthConfig {
    /// No authentication
    #[default]
    None,
    /// Bearer token authentication
    Bearer {
        /// The bearer token (may contain placeholders)
        token: String,
    },
    /// Basic authentication
    Basic {
        /// Username (may contain placeholders)
        username: String,
        /// Password (may contain placeholders)
        password: String,
    },
    /// API Key authentication
    ApiKey {
        /// Header or query parameter name
        key: String,
        /// The API key value
        value: String,
        /// Where to add the key
        #[serde(default)]
        location: ApiKeyLocation,
    },
    /// `OAuth2` with an already acquired token.
    ///
    /// Acquisition and refresh happen elsewhere; only the token is consumed.
    #[serde(rename = "oauth2", rename_all = "camelCase")]
    OAuth2 {
        /// The access token, if one has been obtained
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
    },
}

/// Location for API key authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ApiKeyLocation {
    /// Add to request headers
    #[default]
    Header,
    /// Add to query parameters
    Query,
}

impl AuthConfig {
    /// Returns true if authentication is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Creates a bearer token authentication.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates a basic authentication.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates an API key authentication.
    #[must_use]
    pub fn api_key(
        key: impl Into<String>,
        value: impl Into<String>,
        location: ApiKeyLocation,
    ) -> Self {
        Self::ApiKey {
            key: key.into(),
            value: value.into(),
            location,
        }
    }

    /// Creates an `OAuth2` authentication with an acquired token.
    #[must_use]
    pub fn oauth2(access_token: impl Into<String>) -> Self {
        Self::OAuth2 {
            access_token: Some(access_token.into()),
        }
    }
}

/// The outcome of resolving an [`AuthConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAuth {
    /// Add this header to the request.
    Header {
        /// Header name (e.g., "Authorization").
        name: String,
        /// Header value (e.g., "Bearer token123").
        value: String,
    },
    /// Append this query parameter once the absolute URL is known.
    QueryParam {
        /// Query parameter name.
        name: String,
        /// Query parameter value.
        value: String,
    },
}
