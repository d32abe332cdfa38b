// AMI push task: drives the RHSM gateway through the step runner
//
// The cloud-side upload is an external collaborator behind the
// ImagePublisher trait; this task only publishes metadata about the
// image RHSM should know about.

use async_trait::async_trait;
use common::config::PushConfig;
use common::errors::TaskError;
use common::rhsm::{check_status, ImageMetadata, RhsmClient};
use common::task::{AmiTask, StepRunner};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// What the cloud upload hands back: enough identity to publish
/// metadata about the image.
#[derive(Debug, Clone)]
pub struct PublishedImage {
    pub id: String,
    pub name: String,
}

/// Cloud-side publishing collaborator. Staging and uploading the
/// artifact happen behind this seam.
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    async fn publish(&self, image_path: &str, region: &str) -> anyhow::Result<PublishedImage>;
}

/// Publisher for images that were already uploaded out of band; the
/// identity comes from configuration.
pub struct ConfiguredPublisher {
    id: String,
    name: String,
}

impl ConfiguredPublisher {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl ImagePublisher for ConfiguredPublisher {
    async fn publish(&self, image_path: &str, region: &str) -> anyhow::Result<PublishedImage> {
        info!(image_path, region, image = %self.id, "image already published, reusing identity");
        Ok(PublishedImage {
            id: self.id.clone(),
            name: self.name.clone(),
        })
    }
}

/// The push task itself: ordered, individually skippable steps
pub struct PushTask {
    client: Arc<RhsmClient>,
    publisher: Arc<dyn ImagePublisher>,
    config: PushConfig,
}

impl PushTask {
    pub fn new(
        client: Arc<RhsmClient>,
        publisher: Arc<dyn ImagePublisher>,
        config: PushConfig,
    ) -> Self {
        Self {
            client,
            publisher,
            config,
        }
    }

    fn metadata(config: &PushConfig, published: Option<&PublishedImage>) -> ImageMetadata {
        ImageMetadata {
            image_id: published
                .map(|image| image.id.clone())
                .unwrap_or_else(|| config.image_id.clone()),
            image_name: published
                .map(|image| image.name.clone())
                .unwrap_or_else(|| config.image_name.clone()),
            arch: config.arch.clone(),
            product_name: config.product.clone(),
            version: config.version.clone(),
            variant: config.variant.clone(),
        }
    }
}

#[async_trait]
impl AmiTask for PushTask {
    fn name(&self) -> &str {
        "ami-push"
    }

    async fn run(&self) -> Result<(), TaskError> {
        let mut runner = StepRunner::new(self.config.skip_names());
        let published: Arc<Mutex<Option<PublishedImage>>> = Arc::new(Mutex::new(None));

        // Check that the product is known to RHSM before touching anything.
        {
            let client = Arc::clone(&self.client);
            let product = self.config.product.clone();
            runner.register("query-products", async move {
                let response = client.products().await?;
                let groups: Value = response
                    .json()
                    .await
                    .map_err(|err| TaskError::Failed(format!("invalid products payload: {err}")))?;

                let known = groups["body"]
                    .as_array()
                    .map(|items| items.iter().any(|item| item["name"] == product.as_str()))
                    .unwrap_or(false);
                if !known {
                    return Err(TaskError::Failed(format!(
                        "product {product} is not registered with RHSM"
                    )));
                }
                Ok(())
            });
        }

        {
            let publisher = Arc::clone(&self.publisher);
            let image_path = self.config.image_path.clone();
            let region = self.config.region.clone();
            let published = Arc::clone(&published);
            runner.register("publish", async move {
                let image = publisher
                    .publish(&image_path, &region)
                    .await
                    .map_err(|err| TaskError::Failed(format!("image publish failed: {err}")))?;
                *published.lock().await = Some(image);
                Ok(())
            });
        }

        {
            let client = Arc::clone(&self.client);
            let region = self.config.region.clone();
            let provider = self.config.provider_short_name.clone();
            runner.register("create-region", async move {
                let response = client.create_region(&region, &provider).await?;
                if !response.status().is_success() {
                    // The region usually exists already; not fatal.
                    warn!(region = %region, status = %response.status(), "region not created");
                }
                Ok(())
            });
        }

        {
            let client = Arc::clone(&self.client);
            let config = self.config.clone();
            let published = Arc::clone(&published);
            runner.register("update-image", async move {
                let image = {
                    let guard = published.lock().await;
                    Self::metadata(&config, guard.as_ref())
                };

                let response = client.update_image(&image).await?;
                if response.status().is_success() {
                    return Ok(());
                }

                // Image might not be present on RHSM for update; register it.
                warn!(
                    image = %image.image_id,
                    status = %response.status(),
                    "image not updatable on RHSM, creating it"
                );
                let response = client.create_image(&image, &config.region).await?;
                check_status(response)?;
                Ok(())
            });
        }

        runner.run().await
    }
}
