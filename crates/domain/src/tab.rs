//! Request tabs.

use serde::{Deserialize, Serialize};

use crate::id::{EnvironmentId, TabId, generate_id};
use crate::request::ApiRequest;
use crate::response::ResponseSpec;
use crate::sandbox::TestResult;
use crate::state::RequestState;

/// One user-facing unit of request/response state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    /// Unique identifier
    pub id: TabId,
    /// Display title
    pub title: String,
    /// The request this tab owns
    pub request: ApiRequest,
    /// Environment override; the store's active environment applies otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<EnvironmentId>,
    /// Current execution state
    #[serde(default)]
    pub state: RequestState,
    /// Last response, replaced in place by each successful send
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSpec>,
    /// Tests recorded by the last test script
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    /// Log lines from both scripts of the last send
    #[serde(default)]
    pub script_logs: Vec<String>,
    /// Script errors of the last send, surfaced without failing it
    #[serde(default)]
    pub script_errors: Vec<String>,
}

impl Tab {
    /// Creates a tab for `request`, titled after it.
    #[must_use]
    pub fn new(request: ApiRequest) -> Self {
        Self {
            id: generate_id(),
            title: request.label(),
            request,
            environment_id: None,
            state: RequestState::Idle,
            response: None,
            test_results: Vec::new(),
            script_logs: Vec::new(),
            script_errors: Vec::new(),
        }
    }

    /// Creates a tab with an explicit title.
    #[must_use]
    pub fn titled(title: impl Into<String>, request: ApiRequest) -> Self {
        Self {
            title: title.into(),
            ..Self::new(request)
        }
    }
}

impl Default for Tab {
    fn default() -> Self {
        Self::titled("New Request", ApiRequest::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_tab_is_idle() {
        let tab = Tab::new(ApiRequest::get("https://api.example/users"));
        assert_eq!(tab.title, "GET api.example/users");
        assert_eq!(tab.state, RequestState::Idle);
        assert!(tab.response.is_none());
    }

    #[test]
    fn test_default_tab() {
        let tab = Tab::default();
        assert_eq!(tab.title, "New Request");
        assert!(tab.request.url.is_empty());
    }
}
