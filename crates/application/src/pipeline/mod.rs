//! Request pipeline
//!
//! One [`RequestPipeline::send`] call drives a tab's request through
//! `Building → PreScript → Substituting → AuthResolving → CookieInjecting →
//! BodyEncoding → Dispatching → ResponseParsing → TestScript → Committing →
//! Done`. Any stage may end the run in `Error`. Nothing is retried.
//!
//! Script updates to the environment are visible to the rest of the run
//! at once but reach the store only when the run ends, so concurrent runs
//! never see each other's unfinished writes.

mod classify;
mod encode;
mod response;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use courier_domain::{
    DomainError, EnvironmentId, FailureCause, PipelineStage, RequestErrorKind, RequestState, ResponseSpec,
    SandboxContext, SandboxRequest, SandboxResult, Script, TabId, TestResult, VariableSnapshot,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth;
use crate::ports::{Clock, ScriptSandbox, Transport, TransportRequest};
use crate::store::{CommitData, Store};
use crate::variable_resolver::{substitute_request, unresolved_keys};

pub use classify::classify;
pub use encode::{HeaderList, absolute_url, build_headers, build_url, encode_body, inject_cookies};
pub use response::{parse_response, response_cookies};

/// Default wall-clock budget for one script invocation.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Budget handed to the sandbox for each script
    pub script_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
        }
    }
}

/// Why a run ended in `Error`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The tab does not exist (or was closed before the run started).
    #[error("tab {0} not found")]
    TabNotFound(TabId),

    /// The request configuration is malformed.
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// The transport failed; the cause is classified from its message.
    #[error("{message}")]
    Transport {
        /// Classified cause
        cause: FailureCause,
        /// Transport error text
        message: String,
    },
}

impl PipelineError {
    /// The error category shown to the user.
    #[must_use]
    pub fn kind(&self) -> RequestErrorKind {
        match self {
            Self::TabNotFound(_) => RequestErrorKind::Unknown,
            Self::Validation(_) => RequestErrorKind::Validation,
            Self::Transport { cause, .. } => RequestErrorKind::from(*cause),
        }
    }

    /// Converts the error into the state stored on the tab.
    #[must_use]
    pub fn to_request_state(&self) -> RequestState {
        let kind = self.kind();
        RequestState::error_with_details(kind, kind.title(), self.to_string())
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The URL that was dispatched
    pub url: Url,
    /// The request exactly as handed to the transport
    pub request: TransportRequest,
    /// The parsed response
    pub response: ResponseSpec,
    /// Tests recorded by the test script
    pub test_results: Vec<TestResult>,
    /// Stages visited, in order
    pub stages: Vec<PipelineStage>,
    /// Result of the pre-request script, if one ran
    pub pre_request: Option<SandboxResult>,
    /// Result of the test script, if one ran
    pub test: Option<SandboxResult>,
}

/// Orchestrates one request/response cycle per call.
pub struct RequestPipeline<T> {
    transport: Arc<T>,
    sandbox: Arc<dyn ScriptSandbox>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl<T> std::fmt::Debug for RequestPipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Stage trace and script output collected while a run progresses.
struct Run<'a> {
    store: &'a Store,
    tab_id: TabId,
    environment_id: Option<EnvironmentId>,
    /// Pre-request updates, written back when the run ends
    environment_updates: VariableSnapshot,
    stages: Vec<PipelineStage>,
    logs: Vec<String>,
    script_errors: Vec<String>,
}

impl Run<'_> {
    fn enter(&mut self, stage: PipelineStage) {
        debug!(tab = %self.tab_id, stage = stage.label(), "pipeline stage");
        self.stages.push(stage);
        if stage != PipelineStage::Done {
            self.store.set_stage(self.tab_id, stage);
        }
    }

    fn record_script(&mut self, label: &str, result: &SandboxResult) {
        self.logs.extend(result.logs.iter().cloned());
        if let Some(error) = &result.error {
            warn!(tab = %self.tab_id, script = label, %error, "script error");
            self.script_errors.push(format!("{label}: {error}"));
        }
    }
}

impl<T: Transport> RequestPipeline<T> {
    /// Creates a pipeline with the default configuration.
    pub fn new(transport: Arc<T>, sandbox: Arc<dyn ScriptSandbox>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            sandbox,
            clock,
            config: PipelineConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sends the tab's request and stores the outcome on the tab.
    ///
    /// Script failures never fail the run; they are recorded on the tab.
    ///
    /// # Errors
    ///
    /// Returns the error that moved the tab to `Error`: an unknown tab,
    /// an invalid request, or a transport failure.
    pub async fn send(&self, store: &Store, tab_id: TabId) -> Result<PipelineOutcome, PipelineError> {
        let mut run = Run {
            store,
            tab_id,
            environment_id: None,
            environment_updates: VariableSnapshot::new(),
            stages: Vec::new(),
            logs: Vec::new(),
            script_errors: Vec::new(),
        };

        let result = self.execute(&mut run).await;
        if let Err(err) = &result {
            warn!(tab = %tab_id, error = %err, kind = ?err.kind(), "request failed");
            store.merge_environment_updates(run.environment_id, &run.environment_updates);
            store.fail_send(tab_id, err.to_request_state(), run.logs, run.script_errors);
        }
        result
    }

    async fn execute(&self, run: &mut Run<'_>) -> Result<PipelineOutcome, PipelineError> {
        let tab_id = run.tab_id;

        run.stages.push(PipelineStage::Building);
        let snapshot = run
            .store
            .begin_send(tab_id)
            .ok_or(PipelineError::TabNotFound(tab_id))?;
        debug!(tab = %tab_id, stage = PipelineStage::Building.label(), "pipeline stage");
        run.environment_id = snapshot.environment_id;
        let mut variables = snapshot.variables;

        let pre_request = match snapshot.request.pre_request_script.as_ref() {
            Some(script) if !script.is_empty() => {
                run.enter(PipelineStage::PreScript);
                let result = self.run_script(script, &variables, None).await;
                run.record_script("pre-request script", &result);
                run.environment_updates
                    .extend(result.environment_updates.clone());
                variables.extend(result.environment_updates.clone());
                Some(result)
            }
            _ => None,
        };

        run.enter(PipelineStage::Substituting);
        let missing: BTreeSet<String> = std::iter::once(snapshot.request.url.as_str())
            .chain(snapshot.request.enabled_headers().map(|h| h.value.as_str()))
            .flat_map(|text| unresolved_keys(text, &variables))
            .collect();
        if !missing.is_empty() {
            warn!(tab = %tab_id, keys = ?missing, "request uses undefined variables");
        }
        let resolved = substitute_request(&snapshot.request, &variables);

        run.enter(PipelineStage::AuthResolving);
        let credential = auth::resolve(&resolved.auth)?;
        let url = build_url(&resolved, credential.as_ref())?;
        let mut headers = build_headers(&resolved, credential.as_ref());

        run.enter(PipelineStage::CookieInjecting);
        let injected = inject_cookies(&mut headers, &snapshot.cookies, &url);
        debug!(tab = %tab_id, cookies = injected, "cookies injected");

        run.enter(PipelineStage::BodyEncoding);
        let body = encode_body(&resolved, &mut headers)?;

        run.enter(PipelineStage::Dispatching);
        let request = TransportRequest {
            method: resolved.method,
            url: url.clone(),
            headers,
            body,
            forward_credentials: false,
        };
        info!(tab = %tab_id, method = %request.method, url = %url, "dispatching request");
        let started = Instant::now();
        let raw = self
            .transport
            .send(request.clone())
            .await
            .map_err(|err| PipelineError::Transport {
                cause: classify(&err.message),
                message: err.message,
            })?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        run.enter(PipelineStage::ResponseParsing);
        let response = parse_response(&raw, elapsed_ms);
        let host = url.host_str().unwrap_or_default().to_string();
        let cookies = response_cookies(&raw, &host);
        info!(
            tab = %tab_id,
            status = response.status,
            elapsed_ms,
            size = response.size_bytes,
            "response received"
        );

        let test = match snapshot.request.test_script.as_ref() {
            Some(script) if !script.is_empty() => {
                run.enter(PipelineStage::TestScript);
                let result = self
                    .run_script(script, &variables, Some(&response))
                    .await;
                run.record_script("test script", &result);
                Some(result)
            }
            _ => None,
        };
        let test_results = test
            .as_ref()
            .map(|r| r.test_results.clone())
            .unwrap_or_default();

        run.enter(PipelineStage::Committing);
        let mut environment_updates = std::mem::take(&mut run.environment_updates);
        if let Some(test) = &test {
            environment_updates.extend(test.environment_updates.clone());
        }
        run.store.commit_send(
            tab_id,
            CommitData {
                environment_id: snapshot.environment_id,
                environment_updates,
                history_request: snapshot.request,
                timestamp: self.clock.now(),
                host,
                cookies,
                response: response.clone(),
                test_results: test_results.clone(),
                logs: std::mem::take(&mut run.logs),
                script_errors: std::mem::take(&mut run.script_errors),
            },
        );

        run.enter(PipelineStage::Done);
        Ok(PipelineOutcome {
            url,
            request,
            response,
            test_results,
            stages: std::mem::take(&mut run.stages),
            pre_request,
            test,
        })
    }

    async fn run_script(
        &self,
        script: &Script,
        variables: &VariableSnapshot,
        response: Option<&ResponseSpec>,
    ) -> SandboxResult {
        let mut context = SandboxContext::new(variables.clone());
        if let Some(response) = response {
            context = context.with_response(response.snapshot());
        }
        let request = SandboxRequest {
            script: script.clone(),
            context,
        };
        self.sandbox
            .execute(request, self.config.script_timeout)
            .await
    }
}
