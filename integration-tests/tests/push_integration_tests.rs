// End-to-end push task tests against a wiremock RHSM backend

use async_trait::async_trait;
use common::config::PushConfig;
use common::errors::TaskError;
use common::rhsm::{RhsmClient, RhsmClientConfig};
use common::task::AmiTask;
use push::push::{ImagePublisher, PublishedImage, PushTask};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCTS_PATH: &str = "/v1/internal/cloud_access_providers/amazon/provider_image_groups";
const REGIONS_PATH: &str = "/v1/internal/cloud_access_providers/amazon/regions";
const AMIS_PATH: &str = "/v1/internal/cloud_access_providers/amazon/amis";

struct RecordingPublisher {
    calls: AtomicUsize,
}

impl RecordingPublisher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ImagePublisher for RecordingPublisher {
    async fn publish(&self, _image_path: &str, _region: &str) -> anyhow::Result<PublishedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PublishedImage {
            id: "ami-123".to_string(),
            name: "ami-rhel".to_string(),
        })
    }
}

fn push_config(skip: Option<&str>) -> PushConfig {
    PushConfig {
        skip: skip.map(str::to_string),
        image_path: "/tmp/ami-rhel.raw".to_string(),
        region: "us-east-1".to_string(),
        provider_short_name: "AWS".to_string(),
        image_id: "ami-configured".to_string(),
        image_name: "ami-rhel-configured".to_string(),
        arch: "x86_64".to_string(),
        product: "RHEL".to_string(),
        version: Some("7.3".to_string()),
        variant: Some("Server".to_string()),
    }
}

fn rhsm_client(url: String) -> Arc<RhsmClient> {
    let config = RhsmClientConfig {
        max_retry_sleep: Duration::from_millis(1),
        ..RhsmClientConfig::new(url)
    };
    Arc::new(RhsmClient::new(config).unwrap())
}

async fn mount_products(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": [{"name": "RHEL", "providerShortName": "awstest"}]
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_push_happy_path_updates_existing_image() {
    let server = MockServer::start().await;
    mount_products(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(REGIONS_PATH))
        .and(body_json(json!({
            "regionID": "us-east-1",
            "providerShortname": "AWS",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(AMIS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = RecordingPublisher::new();
    let task = PushTask::new(
        rhsm_client(server.uri()),
        publisher.clone(),
        push_config(None),
    );

    task.run().await.unwrap();
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);

    // The published identity, not the configured one, reaches RHSM.
    let requests = server.received_requests().await.unwrap();
    let update = requests
        .iter()
        .find(|request| request.url.path() == AMIS_PATH)
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&update.body).unwrap();
    assert_eq!(body["amiID"], "ami-123");

    server.verify().await;
}

#[tokio::test]
async fn test_push_falls_back_to_create_when_update_rejected() {
    let server = MockServer::start().await;
    mount_products(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(REGIONS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(AMIS_PATH))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(AMIS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let task = PushTask::new(
        rhsm_client(server.uri()),
        RecordingPublisher::new(),
        push_config(None),
    );

    task.run().await.unwrap();

    // The create body is the one that carries the region.
    let requests = server.received_requests().await.unwrap();
    let create_body = requests
        .iter()
        .filter(|request| request.url.path() == AMIS_PATH)
        .map(|request| serde_json::from_slice::<serde_json::Value>(&request.body).unwrap())
        .find(|body| body.get("region").is_some())
        .unwrap();
    assert_eq!(create_body["region"], "us-east-1");
    assert_eq!(create_body["amiID"], "ami-123");

    server.verify().await;
}

#[tokio::test]
async fn test_skipped_steps_never_reach_the_backend() {
    let server = MockServer::start().await;
    mount_products(&server, 1).await;
    // No region call may happen when the step is skipped.
    Mock::given(method("POST"))
        .and(path(REGIONS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(AMIS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = RecordingPublisher::new();
    let task = PushTask::new(
        rhsm_client(server.uri()),
        publisher.clone(),
        push_config(Some("create-region,publish")),
    );

    task.run().await.unwrap();

    // The publish step was skipped too: no upload, and the configured
    // image identity is what reaches RHSM.
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    let requests = server.received_requests().await.unwrap();
    let update = requests
        .iter()
        .find(|request| request.url.path() == AMIS_PATH)
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&update.body).unwrap();
    assert_eq!(body["amiID"], "ami-configured");

    server.verify().await;
}

#[tokio::test]
async fn test_product_check_failure_aborts_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(AMIS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let publisher = RecordingPublisher::new();
    let task = PushTask::new(
        rhsm_client(server.uri()),
        publisher.clone(),
        push_config(None),
    );

    let err = task.run().await.unwrap_err();
    assert!(matches!(err, TaskError::Rhsm(_)));
    assert!(err.to_string().contains("500"));
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);

    server.verify().await;
}

#[tokio::test]
async fn test_unknown_product_fails_before_any_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": [{"name": "OTHER", "providerShortName": "awstest"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let task = PushTask::new(
        rhsm_client(server.uri()),
        RecordingPublisher::new(),
        push_config(None),
    );

    let err = task.run().await.unwrap_err();
    assert!(matches!(err, TaskError::Failed(_)));
    assert!(err.to_string().contains("RHEL"));

    server.verify().await;
}
