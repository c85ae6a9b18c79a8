//! Integration tests for the service router.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{
    ClientId, InMemoryDirectory, InMemorySubjectStore, NewSubject, OperationType,
    RegistrantDetails, ServiceId, SubjectStatus, SubjectStore,
};
use event_log::InMemoryEventLog;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    DispatcherConfig, Orchestrator, OrchestratorConfig, ProvisioningDispatcher,
    ProvisioningLauncher,
};
use providers::{InMemoryHostingPanel, InMemoryRegistrar};
use provisiond::sweeper::PendingSweeper;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestService {
    app: axum::Router,
    dispatcher: Arc<ProvisioningDispatcher>,
    log: InMemoryEventLog,
    subjects: InMemorySubjectStore,
    panel: InMemoryHostingPanel,
}

async fn setup() -> TestService {
    let metrics_handle = get_metrics_handle();

    let log = InMemoryEventLog::new();
    let subjects = InMemorySubjectStore::new();
    let directory = InMemoryDirectory::new("plano_default");
    directory
        .add_client(
            ClientId::new(1),
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
            },
        )
        .await;
    directory.add_service(ServiceId::new(1), None).await;
    let panel = InMemoryHostingPanel::new();

    let orchestrator = Arc::new(Orchestrator::new(
        log.clone(),
        subjects.clone(),
        directory,
        InMemoryRegistrar::default(),
        panel.clone(),
        OrchestratorConfig::default(),
    ));
    let dispatcher = Arc::new(ProvisioningDispatcher::start(
        orchestrator,
        DispatcherConfig {
            workers: 2,
            queue_capacity: 16,
        },
    ));
    let app = provisiond::create_app(dispatcher.clone(), metrics_handle);

    TestService {
        app,
        dispatcher,
        log,
        subjects,
        panel,
    }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health_reports_worker_pool() {
    let service = setup().await;

    let (status, body) = get(service.app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["workers"], 2);
    assert_eq!(json["queue_capacity"], 16);
    assert_eq!(json["queue_depth"], 0);

    service.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let service = setup().await;

    let response = service
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("provisioning_queue_depth"));

    service.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let service = setup().await;

    let (status, _) = get(service.app.clone(), "/orders").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    service.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_launched_run_shows_up_in_metrics() {
    let service = setup().await;
    let subject = service
        .subjects
        .create(
            NewSubject::new(
                ClientId::new(1),
                ServiceId::new(1),
                "example.com",
                OperationType::Register,
            )
            .status(SubjectStatus::PendingProvisioning),
        )
        .await
        .unwrap();

    service.dispatcher.launch_provisioning(subject.id).unwrap();
    service.dispatcher.shutdown().await;

    assert_eq!(
        service.subjects.get(subject.id).await.unwrap().status,
        SubjectStatus::Active
    );
    let (_, text) = get(service.app.clone(), "/metrics").await;
    assert!(text.contains("provisioning_runs_total"));
    assert!(text.contains("provider_call_duration_seconds"));
}

#[tokio::test]
async fn test_sweeper_recovers_lost_launch() {
    let service = setup().await;
    let subject = service
        .subjects
        .create(
            NewSubject::new(
                ClientId::new(1),
                ServiceId::new(1),
                "lost.example",
                OperationType::UseExisting,
            )
            .status(SubjectStatus::PendingProvisioning),
        )
        .await
        .unwrap();

    let sweeper = PendingSweeper::new(
        service.log.clone(),
        service.subjects.clone(),
        service.dispatcher.clone(),
    );
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(report.launched, 1);

    service.dispatcher.shutdown().await;
    assert_eq!(
        service.subjects.get(subject.id).await.unwrap().status,
        SubjectStatus::Active
    );
    assert_eq!(service.panel.account_count(), 1);

    // Claimed now, so a second sweep leaves it alone.
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(report.launched, 0);
}
