//! Isolated script execution.
//!
//! Every invocation spawns a fresh task that owns its inputs. The caller
//! talks to it through two one-shot channels, one carrying the request in
//! and one carrying the result out. When the budget expires the task is
//! aborted and nothing it buffered is kept.

use std::time::Duration;

use async_trait::async_trait;
use courier_application::ScriptSandbox;
use courier_domain::{MAX_NESTING, SandboxRequest, SandboxResult, Script, nesting_depth};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::interpreter::Interpreter;
use super::parser::parse_script;

/// Script sandbox that runs each script in its own tokio task.
///
/// No task is ever reused: a script that times out is aborted and the
/// next invocation starts from nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolateSandbox;

impl IsolateSandbox {
    /// Creates a new sandbox.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Aborts the isolate if the caller goes away first.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[async_trait]
impl ScriptSandbox for IsolateSandbox {
    async fn execute(&self, request: SandboxRequest, timeout: Duration) -> SandboxResult {
        let (request_tx, request_rx) = oneshot::channel::<SandboxRequest>();
        let (result_tx, result_rx) = oneshot::channel::<SandboxResult>();

        let isolate = AbortOnDrop(tokio::spawn(run_isolate(request_rx, result_tx)));
        debug!(?timeout, "isolate spawned");

        if request_tx.send(request).is_err() {
            return SandboxResult::failed("isolate exited before receiving the script");
        }

        match tokio::time::timeout(timeout, result_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                warn!("isolate terminated without a result");
                SandboxResult::failed("isolate terminated without a result")
            }
            Err(_) => {
                drop(isolate);
                warn!(?timeout, "script timed out, isolate aborted");
                SandboxResult::timed_out()
            }
        }
    }
}

async fn run_isolate(
    request: oneshot::Receiver<SandboxRequest>,
    result: oneshot::Sender<SandboxResult>,
) {
    let Ok(SandboxRequest { script, context }) = request.await else {
        return;
    };

    let instructions = match script {
        Script::Instructions(list) => {
            let depth = nesting_depth(&list);
            if depth > MAX_NESTING {
                warn!(depth, "instruction list nests too deeply");
                let _ = result.send(SandboxResult::failed(format!(
                    "SyntaxError: instructions nest {depth} levels deep, the limit is {MAX_NESTING}"
                )));
                return;
            }
            list
        }
        Script::Source(source) => match parse_script(&source) {
            Ok(list) => list,
            Err(err) => {
                let _ = result.send(SandboxResult::failed(format!("SyntaxError: {err}")));
                return;
            }
        },
    };

    let outcome = Interpreter::new(context).run(&instructions).await;
    let _ = result.send(outcome);
}
