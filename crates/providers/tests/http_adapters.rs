//! Live adapters against a local fake provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::Query,
    http::{HeaderMap, StatusCode},
    routing::{MethodRouter, get, post},
};
use common::RegistrantDetails;
use providers::{
    DomainRegistrar, HostingAccountProvisioner, HostingPanelConfig, HostingerRegistrar,
    NewHostingAccount, OneTimePassword, ProviderError, RegistrarConfig, WhmProvisioner,
};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct RecordedRequest {
    path: &'static str,
    authorization: Option<String>,
    body: Value,
    query: HashMap<String, String>,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<RecordedRequest>>>);

impl Recorder {
    fn record(&self, request: RecordedRequest) {
        self.0.lock().unwrap().push(request);
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.0.lock().unwrap().clone()
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// A POST route answering `status` with `response` and recording the request.
fn json_post(
    recorder: &Recorder,
    path: &'static str,
    status: StatusCode,
    response: Value,
) -> MethodRouter {
    let recorder = recorder.clone();
    post(move |headers: HeaderMap, Json(body): Json<Value>| {
        let recorder = recorder.clone();
        let response = response.clone();
        async move {
            recorder.record(RecordedRequest {
                path,
                authorization: authorization(&headers),
                body,
                query: HashMap::new(),
            });
            (status, Json(response))
        }
    })
}

/// The WHM `createacct` route.
fn whm_get(recorder: &Recorder, status: StatusCode, response: Value) -> MethodRouter {
    let recorder = recorder.clone();
    get(
        move |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| {
            let recorder = recorder.clone();
            let response = response.clone();
            async move {
                recorder.record(RecordedRequest {
                    path: "/json-api/createacct",
                    authorization: authorization(&headers),
                    body: Value::Null,
                    query,
                });
                (status, Json(response))
            }
        },
    )
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn registrant() -> RegistrantDetails {
    RegistrantDetails {
        name: "Ana Souza".to_string(),
        email: "ana@example.com".to_string(),
        phone: "+55.11999999999".to_string(),
        address: "Rua A 1".to_string(),
        city: "Sao Paulo".to_string(),
        state: "SP".to_string(),
        postcode: "01000-000".to_string(),
        country: "BR".to_string(),
        tax_id: None,
    }
}

fn registrar(base_url: &str) -> HostingerRegistrar {
    HostingerRegistrar::new(
        RegistrarConfig::new("registrar-token")
            .with_base_url(base_url)
            .with_timeout(Duration::from_millis(500)),
    )
    .unwrap()
}

fn panel(base_url: &str) -> WhmProvisioner {
    WhmProvisioner::new(
        HostingPanelConfig::new(base_url, "root", "panel-token")
            .with_timeout(Duration::from_millis(500)),
    )
    .unwrap()
}

fn account() -> NewHostingAccount {
    NewHostingAccount {
        username: "user42".to_string(),
        domain: "example.com".to_string(),
        plan: "plano_default".to_string(),
        password: OneTimePassword::new("Xy7#pass&word=1"),
        contact_email: "ana@example.com".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Registrar
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_creates_whois_profile_then_purchases() {
    let recorder = Recorder::default();
    let router = Router::new()
        .route(
            "/domains/v1/whois",
            json_post(&recorder, "/domains/v1/whois", StatusCode::OK, json!({"id": 77})),
        )
        .route(
            "/domains/v1/portfolio",
            json_post(
                &recorder,
                "/domains/v1/portfolio",
                StatusCode::OK,
                json!({"order_id": "ORD-1"}),
            ),
        );
    let base = serve(router).await;

    let order = registrar(&base)
        .register("example.com", &registrant())
        .await
        .unwrap();
    assert_eq!(order.order_id, "ORD-1");

    let requests = recorder.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/domains/v1/whois");
    assert_eq!(requests[0].body["tld"], "com");
    assert_eq!(requests[0].body["whois_details"]["email"], "ana@example.com");
    assert_eq!(requests[1].path, "/domains/v1/portfolio");
    assert_eq!(requests[1].body["domain"], "example.com");
    assert_eq!(requests[1].body["whois_profile_id"], 77);
    assert_eq!(requests[1].body["period"], 1);
    for request in &requests {
        assert_eq!(
            request.authorization.as_deref(),
            Some("Bearer registrar-token")
        );
    }
}

#[tokio::test]
async fn register_conflict_is_rejected_with_provider_message() {
    let recorder = Recorder::default();
    let router = Router::new()
        .route(
            "/domains/v1/whois",
            json_post(&recorder, "/domains/v1/whois", StatusCode::OK, json!({"id": 1})),
        )
        .route(
            "/domains/v1/portfolio",
            json_post(
                &recorder,
                "/domains/v1/portfolio",
                StatusCode::CONFLICT,
                json!({"message": "domain already registered"}),
            ),
        );
    let base = serve(router).await;

    let err = registrar(&base)
        .register("example.com", &registrant())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Rejected { .. }));
    assert!(err.message().contains("domain already registered"));
    assert!(err.message().contains("409"));
}

#[tokio::test]
async fn incomplete_registrant_is_rejected_without_calls() {
    let recorder = Recorder::default();
    let router = Router::new().route(
        "/domains/v1/whois",
        json_post(&recorder, "/domains/v1/whois", StatusCode::OK, json!({"id": 1})),
    );
    let base = serve(router).await;

    let err = registrar(&base)
        .register("example.com", &RegistrantDetails::new("Ana", "ana@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Rejected { .. }));
    assert!(err.message().contains("phone"));
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn server_errors_and_throttling_are_unavailable() {
    for status in [StatusCode::SERVICE_UNAVAILABLE, StatusCode::TOO_MANY_REQUESTS] {
        let recorder = Recorder::default();
        let router = Router::new().route(
            "/domains/v1/transfers",
            json_post(
                &recorder,
                "/domains/v1/transfers",
                status,
                json!({"error": "try later"}),
            ),
        );
        let base = serve(router).await;

        let err = registrar(&base)
            .transfer("example.com", "EPP-1")
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "{status} should be retryable");
        assert!(err.message().contains("try later"));
    }
}

#[tokio::test]
async fn transfer_sends_auth_code_and_accepts_numeric_order_id() {
    let recorder = Recorder::default();
    let router = Router::new().route(
        "/domains/v1/transfers",
        json_post(
            &recorder,
            "/domains/v1/transfers",
            StatusCode::OK,
            json!({"order_id": 12345}),
        ),
    );
    let base = serve(router).await;

    let order = registrar(&base)
        .transfer("moved.io", "EPP-SECRET")
        .await
        .unwrap();
    assert_eq!(order.order_id, "12345");

    let requests = recorder.requests();
    assert_eq!(requests[0].body, json!({"domain": "moved.io", "auth_code": "EPP-SECRET"}));
}

#[tokio::test]
async fn slow_registrar_times_out_as_unavailable() {
    let router = Router::new().route(
        "/domains/v1/transfers",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"order_id": "late"}))
        }),
    );
    let base = serve(router).await;

    let err = registrar(&base)
        .transfer("example.com", "EPP-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }));
}

#[tokio::test]
async fn unreachable_registrar_is_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = registrar(&format!("http://{addr}"))
        .transfer("example.com", "EPP-1")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn malformed_success_body_is_not_retryable() {
    let recorder = Recorder::default();
    let router = Router::new().route(
        "/domains/v1/transfers",
        json_post(&recorder, "/domains/v1/transfers", StatusCode::OK, json!({"status": "ok"})),
    );
    let base = serve(router).await;

    let err = registrar(&base)
        .transfer("example.com", "EPP-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Rejected { .. }));
}

// ---------------------------------------------------------------------------
// Hosting panel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn whm_creates_account() {
    let recorder = Recorder::default();
    let router = Router::new().route(
        "/json-api/createacct",
        whm_get(
            &recorder,
            StatusCode::OK,
            json!({"metadata": {"result": 1, "reason": "Account Creation Ok", "command": "createacct"}}),
        ),
    );
    let base = serve(router).await;

    let account = panel(&base).create_account(&account()).await.unwrap();
    assert_eq!(account.handle, "user42");

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.authorization.as_deref(), Some("whm root:panel-token"));
    assert_eq!(request.query["api.version"], "1");
    assert_eq!(request.query["username"], "user42");
    assert_eq!(request.query["domain"], "example.com");
    assert_eq!(request.query["plan"], "plano_default");
    assert_eq!(request.query["password"], "Xy7#pass&word=1");
    assert_eq!(request.query["contactemail"], "ana@example.com");
}

#[tokio::test]
async fn whm_result_zero_carries_reason_verbatim() {
    let recorder = Recorder::default();
    let reason = "Sorry, a group for that username already exists.";
    let router = Router::new().route(
        "/json-api/createacct",
        whm_get(
            &recorder,
            StatusCode::OK,
            json!({"metadata": {"result": 0, "reason": reason}}),
        ),
    );
    let base = serve(router).await;

    let err = panel(&base).create_account(&account()).await.unwrap_err();
    assert_eq!(err, ProviderError::rejected("whm", reason));
}

#[tokio::test]
async fn whm_http_statuses_are_classified() {
    let cases = [
        (StatusCode::INTERNAL_SERVER_ERROR, true),
        (StatusCode::FORBIDDEN, false),
    ];
    for (status, retryable) in cases {
        let recorder = Recorder::default();
        let router = Router::new().route(
            "/json-api/createacct",
            whm_get(&recorder, status, json!({"error": "nope"})),
        );
        let base = serve(router).await;

        let err = panel(&base).create_account(&account()).await.unwrap_err();
        assert_eq!(err.is_retryable(), retryable, "status {status}");
    }
}

fn assert_no_password(err: &ProviderError) {
    for text in [err.message().to_string(), err.to_string()] {
        assert!(!text.contains("Xy7"), "password leaked: {text}");
        assert!(!text.contains("password="), "password leaked: {text}");
    }
}

#[tokio::test]
async fn unreachable_panel_error_omits_the_password() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = panel(&format!("http://{addr}"))
        .create_account(&account())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_no_password(&err);
}

#[tokio::test]
async fn slow_panel_error_omits_the_password() {
    let router = Router::new().route(
        "/json-api/createacct",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"metadata": {"result": 1}}))
        }),
    );
    let base = serve(router).await;

    let err = panel(&base).create_account(&account()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }));
    assert_no_password(&err);
}
