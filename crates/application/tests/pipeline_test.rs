//! Pipeline tests against in-memory transport and sandbox doubles.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use courier_application::{
    Clock, EncodedBody, PipelineConfig, PipelineError, RequestPipeline, ScriptSandbox, Store,
    StoreEvent, Transport, TransportError, TransportRequest, TransportResponse,
};
use courier_domain::{
    ApiKeyLocation, ApiRequest, AuthConfig, Cookie, Environment, FailureCause, HttpMethod,
    PipelineStage, RequestBody, RequestErrorKind, RequestState, SandboxRequest, SandboxResult,
    Script, TestResult, VariableSnapshot,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }
}

#[derive(Default)]
struct MockTransport {
    requests: Mutex<Vec<TransportRequest>>,
    response: Mutex<Option<Result<TransportResponse, TransportError>>>,
}

impl MockTransport {
    fn replying(response: TransportResponse) -> Arc<Self> {
        let transport = Self::default();
        *transport.response.lock() = Some(Ok(response));
        Arc::new(transport)
    }

    fn failing(message: &str) -> Arc<Self> {
        let transport = Self::default();
        *transport.response.lock() = Some(Err(TransportError::new(message)));
        Arc::new(transport)
    }

    fn sent(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request);
        self.response
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(TransportResponse::default()))
    }
}

/// Replays canned results in call order and records what it was asked to run.
#[derive(Default)]
struct MockSandbox {
    results: Mutex<VecDeque<SandboxResult>>,
    requests: Mutex<Vec<(SandboxRequest, Duration)>>,
}

impl MockSandbox {
    fn with_results(results: Vec<SandboxResult>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ScriptSandbox for MockSandbox {
    async fn execute(&self, request: SandboxRequest, timeout: Duration) -> SandboxResult {
        self.requests.lock().push((request, timeout));
        self.results.lock().pop_front().unwrap_or_default()
    }
}

fn ok_json(body: &str) -> TransportResponse {
    TransportResponse {
        status: 200,
        status_text: "OK".to_string(),
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: body.as_bytes().to_vec(),
    }
}

fn updates(pairs: &[(&str, &str)]) -> VariableSnapshot {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn pipeline(
    transport: &Arc<MockTransport>,
    sandbox: &Arc<MockSandbox>,
) -> RequestPipeline<MockTransport> {
    RequestPipeline::new(Arc::clone(transport), sandbox.clone(), Arc::new(FixedClock))
}

fn store_with_env(pairs: &[(&str, &str)]) -> (Store, courier_domain::EnvironmentId) {
    let store = Store::new();
    let mut env = Environment::new("dev");
    for (k, v) in pairs {
        env = env.with_variable(*k, *v);
    }
    let id = store.add_environment(env);
    store.set_active_environment(Some(id)).unwrap();
    (store, id)
}

#[tokio::test]
async fn test_pre_request_update_is_visible_to_substitution() {
    let (store, env) = store_with_env(&[("id", "42")]);
    let tab = store.add_tab(
        ApiRequest::get("https://api.example/<<id>>")
            .with_pre_request_script(Script::source("environment.set('id', '99')")),
    );
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(vec![SandboxResult {
        environment_updates: updates(&[("id", "99")]),
        ..SandboxResult::default()
    }]);

    let outcome = pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();

    assert_eq!(outcome.url.as_str(), "https://api.example/99");
    assert_eq!(transport.sent()[0].url.as_str(), "https://api.example/99");
    // The sandbox saw the snapshot from before its own update.
    assert_eq!(sandbox.requests.lock()[0].0.context.environment["id"], "42");
    // The persisted environment was updated too.
    assert_eq!(store.environment(env).unwrap().get("id"), Some("99"));
}

#[tokio::test]
async fn test_full_stage_trace() {
    let store = Store::new();
    let tab = store.add_tab(
        ApiRequest::get("https://api.example/")
            .with_pre_request_script(Script::source("console.log('pre')"))
            .with_test_script(Script::source("console.log('test')")),
    );
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(Vec::new());

    let outcome = pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();

    assert_eq!(
        outcome.stages,
        vec![
            PipelineStage::Building,
            PipelineStage::PreScript,
            PipelineStage::Substituting,
            PipelineStage::AuthResolving,
            PipelineStage::CookieInjecting,
            PipelineStage::BodyEncoding,
            PipelineStage::Dispatching,
            PipelineStage::ResponseParsing,
            PipelineStage::TestScript,
            PipelineStage::Committing,
            PipelineStage::Done,
        ]
    );
    assert!(store.tab(tab).unwrap().state.is_success());
}

#[tokio::test]
async fn test_scripts_are_skipped_when_absent() {
    let store = Store::new();
    let tab = store.add_tab(ApiRequest::get("https://api.example/"));
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(Vec::new());

    let outcome = pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();

    assert!(sandbox.requests.lock().is_empty());
    assert!(!outcome.stages.contains(&PipelineStage::PreScript));
    assert!(!outcome.stages.contains(&PipelineStage::TestScript));
}

#[tokio::test]
async fn test_test_script_receives_response_and_results_are_stored() {
    let (store, env) = store_with_env(&[]);
    let tab = store.add_tab(
        ApiRequest::get("https://api.example/missing")
            .with_test_script(Script::source("test('ok', () => expect(response.code).to.be(200))")),
    );
    let transport = MockTransport::replying(TransportResponse {
        status: 404,
        status_text: "Not Found".to_string(),
        headers: Vec::new(),
        body: b"gone".to_vec(),
    });
    let failed = TestResult::fail("ok", "expected 404 to be 200");
    let sandbox = MockSandbox::with_results(vec![SandboxResult {
        environment_updates: updates(&[("last", "404")]),
        test_results: vec![failed.clone()],
        logs: vec!["checked".to_string()],
        error: None,
    }]);

    let outcome = pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();

    let (request, timeout) = sandbox.requests.lock()[0].clone();
    let response = request.context.response.unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.status_text, "Not Found");
    assert_eq!(timeout, Duration::from_secs(10));

    assert_eq!(outcome.test_results, vec![failed.clone()]);
    let stored = store.tab(tab).unwrap();
    assert_eq!(stored.test_results, vec![failed]);
    assert_eq!(stored.script_logs, vec!["checked"]);
    assert_eq!(stored.response.unwrap().status, 404);
    // Test-script updates are merged at commit.
    assert_eq!(store.environment(env).unwrap().get("last"), Some("404"));
}

#[tokio::test]
async fn test_script_errors_do_not_abort_the_run() {
    let store = Store::new();
    let tab = store.add_tab(
        ApiRequest::get("https://api.example/")
            .with_pre_request_script(Script::source("throw 'boom'")),
    );
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(vec![SandboxResult::timed_out()]);

    let outcome = pipeline(&transport, &sandbox).send(&store, tab).await;

    assert!(outcome.is_ok());
    assert_eq!(transport.sent().len(), 1);
    let stored = store.tab(tab).unwrap();
    assert!(stored.state.is_success());
    assert_eq!(stored.script_errors, vec!["pre-request script: timeout"]);
}

#[tokio::test]
async fn test_headers_auth_and_cookies_reach_the_transport() {
    let (store, _) = store_with_env(&[("token", "s3cret")]);
    store.upsert_cookies(
        [
            Cookie::new("sid", "abc", "example.com"),
            Cookie::new("other", "x", "elsewhere.com"),
        ],
        "example.com",
    );
    let tab = store.add_tab(
        ApiRequest::get("api.example.com/v1")
            .with_header("Accept", "application/json")
            .with_auth(AuthConfig::bearer("<<token>>")),
    );
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(Vec::new());

    pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();

    let sent = transport.sent().remove(0);
    assert_eq!(sent.url.as_str(), "https://api.example.com/v1");
    assert_eq!(sent.header("Authorization"), Some("Bearer s3cret"));
    assert_eq!(sent.header("Cookie"), Some("sid=abc"));
    assert_eq!(sent.header("Accept"), Some("application/json"));
    assert!(!sent.forward_credentials);
}

#[tokio::test]
async fn test_query_api_key_is_appended_after_normalization() {
    let store = Store::new();
    let tab = store.add_tab(
        ApiRequest::get("api.example/items")
            .with_query_param("page", "2")
            .with_auth(AuthConfig::api_key("api_key", "k", ApiKeyLocation::Query)),
    );
    let transport = MockTransport::replying(ok_json("[]"));
    let sandbox = MockSandbox::with_results(Vec::new());

    let outcome = pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();
    assert_eq!(outcome.url.as_str(), "https://api.example/items?page=2&api_key=k");
}

#[tokio::test]
async fn test_history_keeps_pre_substitution_request() {
    let (store, _) = store_with_env(&[("host", "api.example")]);
    let request = ApiRequest::new(HttpMethod::Post, "https://<<host>>/users")
        .with_body(RequestBody::json(r#"{"name":"ada"}"#));
    let tab = store.add_tab(request.clone());
    let transport = MockTransport::replying(ok_json(r#"{"id":1}"#));
    let sandbox = MockSandbox::with_results(Vec::new());

    let outcome = pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();

    assert_eq!(outcome.request.body, EncodedBody::Text(r#"{"name":"ada"}"#.to_string()));
    let history = store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].request, request);
    assert_eq!(history[0].status_code, Some(200));
    assert_eq!(history[0].timestamp, FixedClock.now());
}

#[tokio::test]
async fn test_set_cookie_is_committed_to_the_jar() {
    let store = Store::new();
    let tab = store.add_tab(ApiRequest::get("https://api.example/login"));
    let transport = MockTransport::replying(TransportResponse {
        status: 204,
        status_text: String::new(),
        headers: vec![("Set-Cookie".to_string(), "sid=new; Path=/".to_string())],
        body: Vec::new(),
    });
    let sandbox = MockSandbox::with_results(Vec::new());

    pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();

    assert_eq!(
        store.cookies().header_value("api.example", "/"),
        Some("sid=new".to_string())
    );
}

#[tokio::test]
async fn test_transport_failure_is_classified() {
    let store = Store::new();
    let tab = store.add_tab(ApiRequest::get("https://api.example/"));
    let transport = MockTransport::failing("Failed to fetch");
    let sandbox = MockSandbox::with_results(Vec::new());

    let err = pipeline(&transport, &sandbox)
        .send(&store, tab)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transport {
            cause: FailureCause::Cors,
            ..
        }
    ));
    let state = store.tab(tab).unwrap().state;
    match state {
        RequestState::Error { kind, details, .. } => {
            assert_eq!(kind, RequestErrorKind::Cors);
            assert_eq!(details.as_deref(), Some("Failed to fetch"));
        }
        other => panic!("unexpected state {other:?}"),
    }
    assert!(store.history().is_empty());
}

#[tokio::test]
async fn test_invalid_url_is_a_validation_error() {
    let store = Store::new();
    let tab = store.add_tab(ApiRequest::get(""));
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(Vec::new());

    let err = pipeline(&transport, &sandbox)
        .send(&store, tab)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(transport.sent().is_empty());
    assert!(store.tab(tab).unwrap().state.is_error());
}

#[tokio::test]
async fn test_unknown_tab() {
    let store = Store::new();
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(Vec::new());

    let err = pipeline(&transport, &sandbox)
        .send(&store, uuid::Uuid::nil())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::TabNotFound(_)));
}

#[tokio::test]
async fn test_configured_script_timeout_is_passed_through() {
    let store = Store::new();
    let tab = store.add_tab(
        ApiRequest::get("https://api.example/")
            .with_pre_request_script(Script::source("console.log(1)")),
    );
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(Vec::new());

    pipeline(&transport, &sandbox)
        .with_config(PipelineConfig {
            script_timeout: Duration::from_millis(250),
        })
        .send(&store, tab)
        .await
        .unwrap();

    assert_eq!(sandbox.requests.lock()[0].1, Duration::from_millis(250));
}

#[tokio::test]
async fn test_stage_events_are_published() {
    let store = Store::new();
    let tab = store.add_tab(ApiRequest::get("https://api.example/"));
    let mut events = store.subscribe();
    let transport = MockTransport::replying(ok_json("{}"));
    let sandbox = MockSandbox::with_results(Vec::new());

    pipeline(&transport, &sandbox).send(&store, tab).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.first(), Some(&StoreEvent::TabStage(tab, PipelineStage::Building)));
    assert!(seen.contains(&StoreEvent::TabStage(tab, PipelineStage::Dispatching)));
    assert_eq!(seen.last(), Some(&StoreEvent::TabCompleted(tab)));
}

/// Holds every request until released, then echoes the dispatched URL.
#[derive(Default)]
struct GatedTransport {
    gate: tokio::sync::Notify,
    requests: Mutex<Vec<TransportRequest>>,
}

impl Transport for GatedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = request.url.to_string();
        self.requests.lock().push(request);
        self.gate.notified().await;
        Ok(TransportResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: url.into_bytes(),
        })
    }
}

#[tokio::test]
async fn test_concurrent_runs_do_not_see_each_other() {
    let (store, env) = store_with_env(&[("id", "42")]);
    let tab_a = store.add_tab(
        ApiRequest::get("https://api.example/items/<<id>>")
            .with_pre_request_script(Script::source("environment.set('id', '99')")),
    );
    let tab_b = store.add_tab(
        ApiRequest::get("https://api.example/items/<<id>>")
            .with_test_script(Script::source("test('b ok', () => {})")),
    );
    let transport = Arc::new(GatedTransport::default());
    let sandbox = MockSandbox::with_results(vec![
        SandboxResult {
            environment_updates: updates(&[("id", "99")]),
            ..SandboxResult::default()
        },
        SandboxResult {
            test_results: vec![TestResult::pass("b ok")],
            ..SandboxResult::default()
        },
    ]);
    let pipeline = RequestPipeline::new(Arc::clone(&transport), sandbox.clone(), Arc::new(FixedClock));

    let release = async {
        while transport.requests.lock().len() < 2 {
            tokio::task::yield_now().await;
        }
        // Run A has finished its pre-request script; nothing is written yet.
        assert_eq!(store.environment(env).unwrap().get("id"), Some("42"));
        transport.gate.notify_waiters();
    };
    let (a, b, ()) = tokio::join!(
        pipeline.send(&store, tab_a),
        pipeline.send(&store, tab_b),
        release
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.url.as_str(), "https://api.example/items/99");
    assert_eq!(b.url.as_str(), "https://api.example/items/42");

    let tab_a = store.tab(tab_a).unwrap();
    let tab_b = store.tab(tab_b).unwrap();
    assert_eq!(
        tab_a.response.unwrap().body.to_text(),
        "https://api.example/items/99"
    );
    assert_eq!(
        tab_b.response.unwrap().body.to_text(),
        "https://api.example/items/42"
    );
    assert!(tab_a.test_results.is_empty());
    assert_eq!(tab_b.test_results, vec![TestResult::pass("b ok")]);
    assert_eq!(store.environment(env).unwrap().get("id"), Some("99"));
}

#[tokio::test]
async fn test_pre_request_updates_survive_a_failed_dispatch() {
    let (store, env) = store_with_env(&[("token", "old")]);
    let tab = store.add_tab(
        ApiRequest::get("https://api.example/")
            .with_pre_request_script(Script::source("environment.set('token', 'new')")),
    );
    let transport = MockTransport::failing("connection refused");
    let sandbox = MockSandbox::with_results(vec![SandboxResult {
        environment_updates: updates(&[("token", "new")]),
        ..SandboxResult::default()
    }]);

    pipeline(&transport, &sandbox)
        .send(&store, tab)
        .await
        .unwrap_err();

    assert_eq!(store.environment(env).unwrap().get("token"), Some("new"));
    assert!(store.tab(tab).unwrap().state.is_error());
}
