// ami-push binary entry point
//
// Environment variables and files are read here, at the process
// boundary; everything below receives explicit configuration.

use anyhow::{Context, Result};
use common::config::Settings;
use common::rhsm::{RhsmClient, RhsmClientConfig, SessionOptions};
use common::task::AmiTask;
use common::telemetry;
use push::push::{ConfiguredPublisher, ImagePublisher, PushTask};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let mut settings = Settings::load()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    telemetry::init_logging(&settings.observability.log_level)?;

    // Compatibility alias for the worker pool size.
    if let Ok(threads) = std::env::var("RHSM_REQUEST_THREADS") {
        match threads.parse() {
            Ok(threads) => settings.worker.request_threads = threads,
            Err(_) => warn!(value = %threads, "ignoring invalid RHSM_REQUEST_THREADS"),
        }
    }

    settings.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        anyhow::anyhow!("Invalid configuration: {}", e)
    })?;

    info!(
        workers = settings.worker.request_threads,
        url = %settings.rhsm.url,
        "Starting AMI push"
    );

    let session = build_session(&settings)?;
    let client = RhsmClient::new(RhsmClientConfig {
        url: settings.rhsm.url.clone(),
        workers: settings.worker.request_threads,
        session,
        max_retry_sleep: settings.rhsm.max_retry_sleep(),
    })
    .map_err(|e| {
        error!(error = %e, "Failed to create RHSM client");
        anyhow::anyhow!("RHSM client error: {}", e)
    })?;

    let publisher: Arc<dyn ImagePublisher> = Arc::new(ConfiguredPublisher::new(
        settings.push.image_id.clone(),
        settings.push.image_name.clone(),
    ));
    let task = PushTask::new(Arc::new(client), publisher, settings.push.clone());

    task.run().await.map_err(|e| {
        error!(task = task.name(), error = %e, "Push task failed");
        anyhow::anyhow!("Push task failed: {}", e)
    })?;

    info!(task = task.name(), "Push task complete");
    Ok(())
}

/// Build the shared transport options, loading the client certificate
/// pair when configured.
fn build_session(settings: &Settings) -> Result<SessionOptions> {
    let mut session = SessionOptions {
        verify_tls: settings.rhsm.verify_tls,
        timeout: settings.rhsm.timeout(),
        ..SessionOptions::default()
    };

    if let (Some(cert), Some(key)) = (&settings.rhsm.cert_path, &settings.rhsm.key_path) {
        let mut pem = std::fs::read(cert)
            .with_context(|| format!("failed to read RHSM certificate {cert}"))?;
        pem.extend(
            std::fs::read(key).with_context(|| format!("failed to read RHSM key {key}"))?,
        );
        session.identity = Some(
            reqwest::Identity::from_pem(&pem).context("invalid RHSM client certificate pair")?,
        );
    }

    Ok(session)
}
