use crate::config::Settings;
use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;

/// Object storage seam. The pipeline only ever needs whole-object reads and
/// writes, so the surface stays minimal and test doubles stay trivial.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Build from ambient AWS credentials. Region comes from `AWS_REGION`
    /// when set, otherwise the default provider chain; it is fixed at
    /// deployment, never per request.
    pub async fn from_settings(settings: &Settings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = settings.aws_region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let config = loader.load().await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 get_object failed (s3://{bucket}/{key})"))?;

        let bytes = resp
            .body
            .collect()
            .await
            .with_context(|| format!("failed to read s3 object body (s3://{bucket}/{key})"))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("s3 put_object failed (s3://{bucket}/{key})"))?;
        Ok(())
    }
}
