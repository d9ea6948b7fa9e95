//! Gateway tests against a mock BI API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

use pbilink_core::{
    AppContext, AuthenticationResult, Authenticator, AuthorityConfig, BusyObserver, Config,
    FetchError, FetchOutcome, MemorySettings,
};

#[derive(Debug, Default, Deserialize, PartialEq)]
struct Dashboard {
    id: String,
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
struct DashboardList {
    value: Vec<Dashboard>,
}

/// Hands out the queued tokens in order, or fails once the queue is empty
struct QueueAuthenticator {
    tokens: Mutex<VecDeque<&'static str>>,
    calls: AtomicUsize,
}

impl QueueAuthenticator {
    fn new(tokens: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            tokens: Mutex::new(tokens.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for QueueAuthenticator {
    async fn authenticate(&self, _authority: &AuthorityConfig) -> anyhow::Result<AuthenticationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let token = self
            .tokens
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("user cancelled sign-in"))?;
        Ok(AuthenticationResult::new(token, "Bearer", Utc::now() + Duration::hours(1)))
    }
}

#[derive(Default)]
struct RecordingObserver {
    changes: Mutex<Vec<bool>>,
}

impl BusyObserver for RecordingObserver {
    fn on_busy_changed(&self, busy: bool) {
        self.changes.lock().unwrap().push(busy);
    }
}

fn context(
    server: &MockServer,
    authenticator: Arc<QueueAuthenticator>,
    observer: Arc<RecordingObserver>,
) -> AppContext {
    let mut config = Config::default();
    config.authority.client_id = "test-client".to_string();
    config.authority.redirect_url = "https://localhost/redirect".to_string();
    config.api_base_url = format!("{}/v1.0/myorg/", server.uri());

    AppContext::new(
        config,
        authenticator,
        Arc::new(MemorySettings::new()),
        observer,
    )
    .unwrap()
}

fn dashboards_body() -> serde_json::Value {
    json!({
        "@odata.context": "https://api.powerbi.com/v1.0/myorg/$metadata#dashboards",
        "value": [
            {"id": "d1", "displayName": "Sales", "isReadOnly": false},
            {"id": "d2", "displayName": "Ops", "isReadOnly": true}
        ]
    })
}

#[tokio::test]
async fn test_fetch_typed_sends_token_and_decodes_body() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/v1.0/myorg/dashboards"))
        .and(matchers::header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dashboards_body()))
        .expect(2)
        .mount(&server)
        .await;

    let authenticator = QueueAuthenticator::new(&["abc"]);
    let observer = Arc::new(RecordingObserver::default());
    let ctx = context(&server, authenticator.clone(), observer.clone());

    let first: DashboardList = ctx.gateway().fetch_typed("dashboards").await;
    let second: DashboardList = ctx.gateway().fetch_typed("dashboards").await;

    assert_eq!(first.value.len(), 2);
    assert_eq!(first.value[0].display_name, "Sales");
    assert_eq!(first, second);
    // The cached token is reused for the second request
    assert_eq!(authenticator.calls(), 1);
    assert_eq!(ctx.busy().count(), 0);
    assert_eq!(observer.changes.lock().unwrap().last(), Some(&false));
}

#[tokio::test]
async fn test_authenticator_failure_yields_default_value() {
    let server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(dashboards_body()))
        .expect(0)
        .mount(&server)
        .await;

    let authenticator = QueueAuthenticator::new(&[]);
    let ctx = context(&server, authenticator.clone(), Arc::new(RecordingObserver::default()));

    let list: DashboardList = ctx.gateway().fetch_typed("dashboards").await;

    assert_eq!(list, DashboardList::default());
    assert_eq!(authenticator.calls(), 1);
    assert_eq!(ctx.busy().count(), 0);

    let outcome: FetchOutcome<DashboardList> = ctx.gateway().fetch("dashboards").await;
    assert!(matches!(outcome.error(), Some(FetchError::Auth(_))));

    // The token manager itself surfaces the failure
    assert!(ctx.tokens().get_valid_token().await.is_err());
}

#[tokio::test]
async fn test_undecodable_body_yields_default_value() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let ctx = context(
        &server,
        QueueAuthenticator::new(&["abc"]),
        Arc::new(RecordingObserver::default()),
    );

    let list: DashboardList = ctx.gateway().fetch_typed("dashboards").await;
    assert_eq!(list, DashboardList::default());

    let err = ctx
        .gateway()
        .try_fetch::<DashboardList>("dashboards")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn test_server_error_is_reported_as_empty_outcome() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let ctx = context(
        &server,
        QueueAuthenticator::new(&["abc"]),
        Arc::new(RecordingObserver::default()),
    );

    let outcome: FetchOutcome<DashboardList> = ctx.gateway().fetch("dashboards").await;
    match outcome.error() {
        Some(FetchError::ServerError(body)) => assert_eq!(body, "try later"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(ctx.busy().count(), 0);
}

#[tokio::test]
async fn test_large_error_body_is_cut_short() {
    let server = MockServer::start().await;
    let page = format!("<html>{}</html>", "gateway timeout ".repeat(64 * 1024));
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string(page))
        .mount(&server)
        .await;

    let ctx = context(
        &server,
        QueueAuthenticator::new(&["abc"]),
        Arc::new(RecordingObserver::default()),
    );

    let outcome: FetchOutcome<DashboardList> = ctx.gateway().fetch("dashboards").await;
    match outcome.error() {
        Some(FetchError::ServerError(body)) => {
            assert!(body.starts_with("<html>gateway timeout"));
            assert!(body.ends_with("... (truncated)"));
            assert!(body.len() < 600);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(ctx.busy().count(), 0);
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_request_retried() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dashboards_body()))
        .expect(1)
        .mount(&server)
        .await;

    let authenticator = QueueAuthenticator::new(&["revoked", "fresh"]);
    let ctx = context(&server, authenticator.clone(), Arc::new(RecordingObserver::default()));

    let list: DashboardList = ctx.gateway().try_fetch("dashboards").await.unwrap();

    assert_eq!(list.value.len(), 2);
    assert_eq!(authenticator.calls(), 2);
    assert_eq!(
        ctx.tokens().cached_token().map(|t| t.access_token),
        Some("fresh".to_string())
    );
}

#[tokio::test]
async fn test_absolute_urls_bypass_base_url() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/other/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(
        &server,
        QueueAuthenticator::new(&["abc"]),
        Arc::new(RecordingObserver::default()),
    );

    let url = format!("{}/other/groups", server.uri());
    let outcome: FetchOutcome<DashboardList> = ctx.gateway().fetch(&url).await;
    assert_eq!(outcome.data(), Some(DashboardList::default()));
}
