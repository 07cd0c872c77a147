//! Store hooks driven by the request pipeline.
//!
//! A run reads shared state once in [`Store::begin_send`] and writes it
//! back once when it ends, in [`Store::commit_send`] or
//! [`Store::fail_send`], so concurrent runs on different tabs never observe
//! each other's partial state. No lock is held while the pipeline awaits.

use chrono::{DateTime, Utc};
use courier_domain::{
    ApiRequest, Cookie, CookieJar, EnvironmentId, HistoryEntry, PipelineStage, RequestState,
    ResponseSpec, TabId, TestResult, VariableSnapshot,
};
use tracing::debug;

use super::{Store, StoreEvent};

/// What a pipeline run starts from.
#[derive(Debug, Clone)]
pub(crate) struct SendSnapshot {
    /// The tab's request before substitution
    pub request: ApiRequest,
    /// Environment the run reads and writes, if any
    pub environment_id: Option<EnvironmentId>,
    /// Enabled variables of that environment
    pub variables: VariableSnapshot,
    /// Copy of the cookie jar
    pub cookies: CookieJar,
}

/// What a successful run writes back.
#[derive(Debug, Clone)]
pub(crate) struct CommitData {
    pub environment_id: Option<EnvironmentId>,
    pub environment_updates: VariableSnapshot,
    pub history_request: ApiRequest,
    pub timestamp: DateTime<Utc>,
    pub host: String,
    pub cookies: Vec<Cookie>,
    pub response: ResponseSpec,
    pub test_results: Vec<TestResult>,
    pub logs: Vec<String>,
    pub script_errors: Vec<String>,
}

impl Store {
    /// Marks the tab as loading and snapshots what the run needs.
    ///
    /// Returns `None` when the tab does not exist.
    pub(crate) fn begin_send(&self, tab_id: TabId) -> Option<SendSnapshot> {
        let snapshot = {
            let mut state = self.state.write();
            let tab = state.tabs.iter().find(|t| t.id == tab_id)?;
            let environment = state.environment_for(tab);
            let snapshot = SendSnapshot {
                request: tab.request.clone(),
                environment_id: environment.map(|e| e.id),
                variables: environment.map(|e| e.snapshot()).unwrap_or_default(),
                cookies: state.cookies.clone(),
            };
            let tab = state.tab_mut(tab_id).ok()?;
            tab.state = RequestState::loading();
            tab.script_logs.clear();
            tab.script_errors.clear();
            snapshot
        };
        self.emit(StoreEvent::TabStage(tab_id, PipelineStage::Building));
        Some(snapshot)
    }

    /// Records the stage a run has reached. Ignored if the tab was closed.
    pub(crate) fn set_stage(&self, tab_id: TabId, stage: PipelineStage) {
        let updated = self.state.write().tab_mut(tab_id).is_ok_and(|tab| {
            tab.state = RequestState::Loading { stage };
            true
        });
        if updated {
            self.emit(StoreEvent::TabStage(tab_id, stage));
        }
    }

    /// Writes a run's script updates into its environment.
    pub(crate) fn merge_environment_updates(
        &self,
        environment_id: Option<EnvironmentId>,
        updates: &VariableSnapshot,
    ) {
        let Some(id) = environment_id else {
            debug!("no environment selected, script updates stay local to the run");
            return;
        };
        if updates.is_empty() {
            return;
        }
        let applied = self
            .state
            .write()
            .environment_mut(id)
            .map(|env| env.apply_updates(updates))
            .is_ok();
        if applied {
            self.emit(StoreEvent::EnvironmentChanged(id));
        }
    }

    /// Stores the outcome of a successful run.
    pub(crate) fn commit_send(&self, tab_id: TabId, commit: CommitData) {
        let CommitData {
            environment_id,
            environment_updates,
            history_request,
            timestamp,
            host,
            cookies,
            response,
            test_results,
            logs,
            script_errors,
        } = commit;

        self.merge_environment_updates(environment_id, &environment_updates);

        let (history_added, cookies_changed, tab_found) = {
            let mut state = self.state.write();

            let history_added = state.settings.auto_save_history;
            if history_added {
                let entry = HistoryEntry::new(
                    history_request,
                    response.status,
                    response.elapsed_ms,
                    timestamp,
                );
                state.history.add(entry);
            }

            let cookies_changed = !cookies.is_empty();
            if cookies_changed {
                state.cookies.upsert(cookies, &host);
            }

            let tab_found = state.tab_mut(tab_id).is_ok_and(|tab| {
                tab.response = Some(response);
                tab.test_results = test_results;
                tab.script_logs = logs;
                tab.script_errors = script_errors;
                tab.state = RequestState::Success;
                true
            });
            (history_added, cookies_changed, tab_found)
        };

        if history_added {
            self.emit(StoreEvent::HistoryChanged);
        }
        if cookies_changed {
            self.emit(StoreEvent::CookiesChanged);
        }
        if tab_found {
            self.emit(StoreEvent::TabCompleted(tab_id));
        }
    }

    /// Stores the outcome of a failed run. The previous response stays.
    pub(crate) fn fail_send(
        &self,
        tab_id: TabId,
        error: RequestState,
        logs: Vec<String>,
        script_errors: Vec<String>,
    ) {
        let tab_found = self.state.write().tab_mut(tab_id).is_ok_and(|tab| {
            tab.state = error;
            tab.script_logs = logs;
            tab.script_errors = script_errors;
            true
        });
        if tab_found {
            self.emit(StoreEvent::TabCompleted(tab_id));
        }
    }
}
