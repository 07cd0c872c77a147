//! Script sandbox port

use std::time::Duration;

use async_trait::async_trait;
use courier_domain::{SandboxRequest, SandboxResult};

/// Port for running user scripts in isolation.
///
/// Implementations must never fail: parse errors, uncaught exceptions and
/// timeouts are reported through [`SandboxResult::error`]. The script gets
/// no access to anything outside the request message.
#[async_trait]
pub trait ScriptSandbox: Send + Sync {
    /// Runs `request.script` against `request.context` within `timeout`.
    ///
    /// When the budget expires the execution unit is destroyed and
    /// [`SandboxResult::timed_out`] is returned.
    async fn execute(&self, request: SandboxRequest, timeout: Duration) -> SandboxResult;
}
