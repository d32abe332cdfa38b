// RHSM backend gateway
//
// Builds URLs and JSON payloads for the backend operations and submits
// them through the retrying executor. Submission never blocks; every
// operation hands back a RequestFuture with the operation's own
// success/failure handling already attached.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::errors::RhsmError;
use crate::retry::{ExponentialBackoff, RetryStrategy};

use super::executor::{RequestExecutor, SessionOptions};
use super::future::{check_status, RequestFuture};
use super::request::RequestDescriptor;

/// Default number of parallel request workers
pub const DEFAULT_REQUEST_THREADS: usize = 4;

const PROVIDER_IMAGE_GROUPS_PATH: &str =
    "/v1/internal/cloud_access_providers/amazon/provider_image_groups";
const REGIONS_PATH: &str = "v1/internal/cloud_access_providers/amazon/regions";
const AMIS_PATH: &str = "/v1/internal/cloud_access_providers/amazon/amis";

/// Construction-time settings for the client.
///
/// All of this is immutable once the client exists and shared read-only
/// by the workers.
#[derive(Clone)]
pub struct RhsmClientConfig {
    /// Base URL of the RHSM API; required
    pub url: String,
    /// Worker pool size
    pub workers: usize,
    /// Transport options applied once per worker
    pub session: SessionOptions,
    /// Cap on the sleep between transport retries. Mainly provided so
    /// that tests can reduce the time needed to retry.
    pub max_retry_sleep: Duration,
}

impl Default for RhsmClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            workers: DEFAULT_REQUEST_THREADS,
            session: SessionOptions::default(),
            max_retry_sleep: Duration::from_secs(120),
        }
    }
}

impl RhsmClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Identity of one machine image as RHSM tracks it
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub image_id: String,
    pub image_name: String,
    pub arch: String,
    pub product_name: String,
    pub version: Option<String>,
    pub variant: Option<String>,
}

/// Client for RHSM updates
#[derive(Debug)]
pub struct RhsmClient {
    url: String,
    executor: RequestExecutor,
}

impl RhsmClient {
    /// Create a new RHSM client and spawn its worker pool.
    ///
    /// Must be called within a Tokio runtime. Fails with a
    /// configuration error when no base URL was supplied; nothing is
    /// retried in that case.
    pub fn new(config: RhsmClientConfig) -> Result<Self, RhsmError> {
        if config.url.trim().is_empty() {
            return Err(RhsmError::Configuration("RHSM URL not provided".to_string()));
        }

        let retry: Arc<dyn RetryStrategy> =
            Arc::new(ExponentialBackoff::with_max_sleep(config.max_retry_sleep));
        let executor = RequestExecutor::new(config.workers, config.session, retry);

        Ok(Self {
            url: config.url,
            executor,
        })
    }

    /// Query the provider image groups (products) known to RHSM.
    ///
    /// The resolved response is status-checked: an error status fails
    /// the future with a status error.
    pub fn products(&self) -> RequestFuture {
        let url = join_url(&self.url, PROVIDER_IMAGE_GROUPS_PATH);
        let descriptor = RequestDescriptor::new(Method::GET, url);

        self.executor.submit(descriptor).map(check_status, |err| {
            error!("Unable to get RHSM products: {err}");
        })
    }

    /// Register a provider region with RHSM.
    ///
    /// An error status does not fail the future; callers inspect the
    /// resolved response's status themselves.
    pub fn create_region(&self, region_id: &str, provider_short_name: &str) -> RequestFuture {
        let url = join_url(&self.url, REGIONS_PATH);
        let body = json!({
            "regionID": region_id,
            "providerShortname": provider_short_name,
        });
        let descriptor = RequestDescriptor::with_json(Method::POST, url, body);

        let region = region_id.to_string();
        self.executor.submit(descriptor).map(Ok, move |err| {
            error!(region = %region, "Failed to process request to RHSM with exception {err}");
        })
    }

    /// Update the metadata of an image already known to RHSM.
    pub fn update_image(&self, image: &ImageMetadata) -> RequestFuture {
        let url = join_url(&self.url, AMIS_PATH);
        let body = image_body(image, None, Utc::now());
        let descriptor = RequestDescriptor::with_json(Method::PUT, url, body);

        let image_id = image.image_id.clone();
        self.executor.submit(descriptor).map(Ok, move |err| {
            error!(image = %image_id, "Failed to process request to RHSM with exception {err}");
        })
    }

    /// Register a new image with RHSM in the given region.
    pub fn create_image(&self, image: &ImageMetadata, region: &str) -> RequestFuture {
        let url = join_url(&self.url, AMIS_PATH);
        let body = image_body(image, Some(region), Utc::now());
        let descriptor = RequestDescriptor::with_json(Method::POST, url, body);

        let image_id = image.image_id.clone();
        self.executor.submit(descriptor).map(Ok, move |err| {
            error!(image = %image_id, "Failed to process request to RHSM with exception {err}");
        })
    }
}

/// Join a relative endpoint path onto the configured base URL.
///
/// A leading separator on the path must not discard the base URL the
/// way naive path-joining would; the endpoint strings are written both
/// ways and the resulting URL is the same either way.
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Image payload shared by update and create. The timestamp is a
/// parameter so the description is testable against a fixed instant.
fn image_body(image: &ImageMetadata, region: Option<&str>, now: DateTime<Utc>) -> Value {
    let mut body = json!({
        "amiID": image.image_id,
        "arch": image.arch.to_lowercase(),
        "product": image.product_name,
        "version": image.version,
        "variant": image.variant,
        "description": format!(
            "Released {} on {}",
            image.image_name,
            now.format("%Y-%m-%dT%H:%M:%S")
        ),
        "status": "VISIBLE",
    });

    if let Some(region) = region {
        body["region"] = Value::String(region.to_string());
    }

    body
}
