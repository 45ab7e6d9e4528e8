use crate::config::S3Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Content type exam images are uploaded with
pub const EXAM_CONTENT_TYPE: &str = "image/jpeg";

/// Object key an exam image for `patient_id` is uploaded to
pub fn exam_object_key(patient_id: &str) -> String {
    format!("exams/{patient_id}.jpg")
}

/// Issues time-boxed URLs that let a client write one object directly
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadAuthorizer: Send + Sync {
    /// Presign an upload of `key` with `content_type`, valid for `ttl`
    async fn authorize(&self, key: &str, content_type: &str, ttl: Duration) -> Result<String>;

    /// Bucket the authorized uploads land in
    fn bucket(&self) -> &str;
}

/// Presigned S3 `PutObject` URLs
pub struct S3UploadAuthorizer {
    client: S3Client,
    bucket: String,
}

impl S3UploadAuthorizer {
    /// Create a new authorizer
    pub async fn new(config: &S3Config) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 upload authorizer initialized"
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl UploadAuthorizer for S3UploadAuthorizer {
    #[instrument(skip(self))]
    async fn authorize(&self, key: &str, content_type: &str, ttl: Duration) -> Result<String> {
        let presigning_config =
            PresigningConfig::expires_in(ttl).context("Failed to create presigning config")?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning_config)
            .await
            .context("Failed to generate presigned upload URL")?;

        debug!(bucket = %self.bucket, "Upload URL presigned");

        Ok(presigned.uri().to_string())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
