//! Request execution state types for UI binding.
//!
//! This module defines the pipeline stages a send moves through and the
//! per-tab state the UI renders from.

use serde::{Deserialize, Serialize};

/// Stages of one pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    /// Snapshotting the request and environment.
    Building,
    /// Running the pre-request script.
    PreScript,
    /// Resolving `<<KEY>>` placeholders.
    Substituting,
    /// Resolving the auth configuration.
    AuthResolving,
    /// Normalizing the URL and attaching jar cookies.
    CookieInjecting,
    /// Encoding the body.
    BodyEncoding,
    /// Waiting on the transport.
    Dispatching,
    /// Decoding the response.
    ResponseParsing,
    /// Running the test script.
    TestScript,
    /// Writing results back to the store.
    Committing,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Error,
}

impl PipelineStage {
    /// Returns a short human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Building => "Preparing request",
            Self::PreScript => "Running pre-request script",
            Self::Substituting => "Substituting variables",
            Self::AuthResolving => "Resolving auth",
            Self::CookieInjecting => "Attaching cookies",
            Self::BodyEncoding => "Encoding body",
            Self::Dispatching => "Sending",
            Self::ResponseParsing => "Reading response",
            Self::TestScript => "Running tests",
            Self::Committing => "Saving results",
            Self::Done => "Done",
            Self::Error => "Failed",
        }
    }
}

/// Classified cause of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCause {
    /// The request was blocked by cross-origin policy.
    Cors,
    /// The network was unreachable or the connection failed.
    Network,
    /// Anything the known message patterns do not cover.
    Unknown,
}

/// Categories of request errors for user-friendly display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestErrorKind {
    /// Malformed URL, auth or body configuration.
    Validation,
    /// Blocked by cross-origin policy.
    Cors,
    /// Network failure.
    Network,
    /// Unknown or unexpected error.
    Unknown,
}

impl From<FailureCause> for RequestErrorKind {
    fn from(cause: FailureCause) -> Self {
        match cause {
            FailureCause::Cors => Self::Cors,
            FailureCause::Network => Self::Network,
            FailureCause::Unknown => Self::Unknown,
        }
    }
}

impl RequestErrorKind {
    /// Returns user-friendly suggestions for this error type.
    #[must_use]
    pub const fn suggestions(&self) -> &[&'static str] {
        match self {
            Self::Validation => &[
                "Check the URL, auth and body settings of this request",
                "Verify every <<variable>> used has a value in the active environment",
            ],
            Self::Cors => &[
                "The server did not allow this origin",
                "Enable CORS on the server or route the request through a proxy",
            ],
            Self::Network => &[
                "Check if the server is running and reachable",
                "Verify your internet connection",
                "Check that the hostname and port are correct",
            ],
            Self::Unknown => &[
                "An unexpected error occurred",
                "Check the error details for more information",
            ],
        }
    }

    /// Returns a human-readable title for this error type.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid Request",
            Self::Cors => "Blocked by CORS",
            Self::Network => "Network Error",
            Self::Unknown => "Unknown Error",
        }
    }
}

/// Represents the current state of a tab's request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RequestState {
    /// Nothing sent yet.
    #[default]
    Idle,

    /// A pipeline run is in flight.
    Loading {
        /// Stage currently executing.
        stage: PipelineStage,
    },

    /// The last run completed; the response is on the tab.
    Success,

    /// The last run failed.
    Error {
        /// Error category for display.
        kind: RequestErrorKind,
        /// Human-readable error message.
        message: String,
        /// Optional technical details.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl RequestState {
    /// Creates a Loading state at the first stage.
    #[must_use]
    pub const fn loading() -> Self {
        Self::Loading {
            stage: PipelineStage::Building,
        }
    }

    /// Creates an Error state.
    #[must_use]
    pub fn error(kind: RequestErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an Error state with details.
    #[must_use]
    pub fn error_with_details(
        kind: RequestErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::Error {
            kind,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Returns true if a request is in progress.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Returns true if the last request succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the last request failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns the stage if loading.
    #[must_use]
    pub const fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Loading { stage } => Some(*stage),
            _ => None,
        }
    }
}
