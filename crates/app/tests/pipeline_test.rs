//! End-to-end tests: the real sandbox and state file, an in-memory transport.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use courier_application::{
    PipelineConfig, RequestPipeline, StateRepository, Store, Transport, TransportError,
    TransportRequest, TransportResponse,
};
use courier_domain::{
    ApiRequest, AuthConfig, Environment, EnvironmentId, Instruction, Script, TestResult,
};
use courier_infrastructure::{FileStateRepository, IsolateSandbox, SystemClock};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Replies with one canned response and records every request.
struct InMemoryTransport {
    response: TransportResponse,
    sent: Mutex<Vec<TransportRequest>>,
}

impl InMemoryTransport {
    fn new(status: u16, headers: &[(&str, &str)], body: &str) -> Arc<Self> {
        Arc::new(Self {
            response: TransportResponse {
                status,
                status_text: String::new(),
                headers: headers
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                body: body.as_bytes().to_vec(),
            },
            sent: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.url.to_string()).collect()
    }
}

impl Transport for InMemoryTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.sent.lock().push(request);
        Ok(self.response.clone())
    }
}

fn pipeline(transport: &Arc<InMemoryTransport>) -> RequestPipeline<InMemoryTransport> {
    RequestPipeline::new(
        Arc::clone(transport),
        Arc::new(IsolateSandbox::new()),
        Arc::new(SystemClock::new()),
    )
}

fn store_with(pairs: &[(&str, &str)]) -> (Store, EnvironmentId) {
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
async fn test_pre_request_script_drives_the_url() {
    let (store, env) = store_with(&[("host", "api.example"), ("id", "42")]);
    let tab = store.add_tab(
        ApiRequest::get("https://<<host>>/users/<<id>>").with_pre_request_script(Script::source(
            "pm.environment.set('id', 99); console.log('id is', environment.get('id'));",
        )),
    );
    let transport = InMemoryTransport::new(200, &[("content-type", "application/json")], "{}");

    pipeline(&transport).send(&store, tab).await.unwrap();

    assert_eq!(transport.urls(), vec!["https://api.example/users/99"]);
    assert_eq!(store.environment(env).unwrap().get("id"), Some("99"));
    assert_eq!(store.tab(tab).unwrap().script_logs, vec!["id is 99"]);
}

#[tokio::test]
async fn test_failed_assertion_mentions_actual_status() {
    let (store, _) = store_with(&[]);
    let tab = store.add_tab(ApiRequest::get("https://api.example/missing").with_test_script(
        Script::source(
            r#"
            test("is ok", function () {
                expect(response.code).to.be(200);
            });
            test("reports not found", () => {
                expect(response.status).to.equal("Not Found");
                expect(response.json().error).to.be("gone");
            });
            "#,
        ),
    ));
    let transport = InMemoryTransport::new(
        404,
        &[("content-type", "application/json")],
        r#"{"error": "gone"}"#,
    );

    let outcome = pipeline(&transport).send(&store, tab).await.unwrap();

    assert_eq!(outcome.test_results.len(), 2);
    let failed = &outcome.test_results[0];
    assert!(!failed.passed());
    assert!(failed.message.as_deref().unwrap().contains("404"));
    assert_eq!(outcome.test_results[1], TestResult::pass("reports not found"));

    let committed = store.tab(tab).unwrap();
    assert!(committed.state.is_success());
    assert_eq!(committed.test_results, outcome.test_results);
}

#[tokio::test]
async fn test_failing_test_keeps_buffered_updates() {
    let (store, env) = store_with(&[]);
    let tab = store.add_tab(ApiRequest::get("https://api.example").with_test_script(
        Script::source(
            r#"
            environment.set("a", "1");
            environment.set("b", "2");
            test("explodes", () => { throw new Error("boom"); });
            "#,
        ),
    ));
    let transport = InMemoryTransport::new(200, &[], "ok");

    let outcome = pipeline(&transport).send(&store, tab).await.unwrap();

    assert_eq!(outcome.test_results, vec![TestResult::fail("explodes", "boom")]);
    let env = store.environment(env).unwrap();
    assert_eq!(env.get("a"), Some("1"));
    assert_eq!(env.get("b"), Some("2"));
}

#[tokio::test(start_paused = true)]
async fn test_script_timeout_does_not_stop_the_request() {
    let (store, env) = store_with(&[("id", "1")]);
    let tab = store.add_tab(
        ApiRequest::get("https://api.example/<<id>>")
            .with_pre_request_script(Script::source("environment.set('id', 2); sleep(60000)")),
    );
    let transport = InMemoryTransport::new(200, &[], "");
    let pipeline = pipeline(&transport).with_config(PipelineConfig {
        script_timeout: Duration::from_secs(10),
    });

    let outcome = pipeline.send(&store, tab).await.unwrap();

    assert!(outcome.pre_request.unwrap().is_timeout());
    assert_eq!(transport.urls(), vec!["https://api.example/1"]);
    assert_eq!(store.environment(env).unwrap().get("id"), Some("1"));
    assert_eq!(
        store.tab(tab).unwrap().script_errors,
        vec!["pre-request script: timeout"]
    );
}

#[tokio::test]
async fn test_reserved_keys_and_declarative_scripts() {
    let (store, env) = store_with(&[("token", "abc")]);
    let tab = store.add_tab(
        ApiRequest::get("https://api.example")
            .with_auth(AuthConfig::Bearer {
                token: "<<token>>".to_string(),
            })
            .with_pre_request_script(Script::source("environment.set('__proto__', 'polluted')"))
            .with_test_script(Script::Instructions(vec![
                Instruction::ResponseStatus {
                    name: "created".to_string(),
                    expected: 201,
                },
                Instruction::EnvBe {
                    name: "token kept".to_string(),
                    key: "token".to_string(),
                    expected: serde_json::json!("abc"),
                },
            ])),
    );
    let transport = InMemoryTransport::new(201, &[], "");

    let outcome = pipeline(&transport).send(&store, tab).await.unwrap();

    assert_eq!(
        outcome.request.header("authorization"),
        Some("Bearer abc")
    );
    assert_eq!(
        outcome.test_results,
        vec![TestResult::pass("created"), TestResult::pass("token kept")]
    );
    assert_eq!(store.environment(env).unwrap().get("__proto__"), None);
    let logs = store.tab(tab).unwrap().script_logs;
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("warning:"));
}

#[tokio::test]
async fn test_state_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let repository = FileStateRepository::new(dir.path().join("state.json"));

    let (store, env) = store_with(&[("host", "api.example")]);
    let tab = store.add_tab(ApiRequest::get("https://<<host>>/login"));
    let transport = InMemoryTransport::new(
        200,
        &[("set-cookie", "session=s1; Path=/")],
        "welcome",
    );
    pipeline(&transport).send(&store, tab).await.unwrap();
    repository.save(&store.persisted()).await.unwrap();

    let restored = Store::from_persisted(repository.load().await.unwrap());
    assert_eq!(restored.environment(env).unwrap().get("host"), Some("api.example"));
    assert_eq!(restored.history().len(), 1);
    assert_eq!(restored.history()[0].request.url, "https://<<host>>/login");
    assert_eq!(
        restored.cookies().header_value("api.example", "/"),
        Some("session=s1".to_string())
    );

    // The restored jar feeds the next request.
    let next = restored.add_tab(ApiRequest::get("https://api.example/me"));
    let transport = InMemoryTransport::new(200, &[], "");
    let outcome = pipeline(&transport).send(&restored, next).await.unwrap();
    assert_eq!(outcome.request.header("cookie"), Some("session=s1"));
}
