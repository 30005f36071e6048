//! S3-compatible object client using the AWS SDK.

use super::remote::ObjectClient;
use super::{ByteStream, SourceError, SourceResult};
use crate::config::StorageConfig;
use crate::http::range::ByteRange;
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::Client;
use futures::StreamExt;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// [`ObjectClient`] backed by `aws_sdk_s3`.
///
/// Retry and backoff are the SDK's standard policy; connect and per-attempt
/// timeouts come from `storage.timeout_secs`.
#[derive(Debug, Clone)]
pub struct S3ObjectClient {
    client: Client,
}

impl S3ObjectClient {
    pub async fn new(config: &StorageConfig) -> SourceResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(timeout)
            .operation_attempt_timeout(timeout)
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .timeout_config(timeouts);

        match (&config.access_key_id, &config.secret_access_key) {
            (Some(key_id), Some(secret)) => {
                let credentials = aws_sdk_s3::config::Credentials::new(
                    key_id,
                    secret,
                    None, // session token
                    None, // expiration
                    "fgbserve-config",
                );
                loader = loader.credentials_provider(credentials);
            }
            (None, None) => {}
            _ => {
                return Err(SourceError::Config(
                    "storage requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ))
            }
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(normalize_endpoint(endpoint));
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }
}

/// Bare `host:port` endpoints (e.g. a local `MinIO`) default to plain HTTP.
fn normalize_endpoint(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

/// 404 becomes `NotFound`; everything else (403, throttling, dispatch and
/// timeout failures) is `Unavailable`.
fn map_sdk_error<E>(err: SdkError<E>, key: &str) -> SourceError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let SdkError::ServiceError(ref service_err) = err {
        if service_err.raw().status().as_u16() == 404 {
            return SourceError::NotFound(key.to_string());
        }
    }
    SourceError::Unavailable(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head_object(&self, bucket: &str, key: &str) -> SourceResult<u64> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        output
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .ok_or_else(|| SourceError::Unavailable(format!("no content length for {key}")))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> SourceResult<ByteStream> {
        // S3 Range header uses inclusive end, same as ByteRange
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={}-{}", range.start, range.end))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let body = ReaderStream::new(output.body.into_async_read()).map(|piece| {
            piece.map_err(|e| SourceError::Unavailable(format!("object body read failed: {e}")))
        });

        Ok(Box::pin(body))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head_bucket(&self, bucket: &str) -> SourceResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| match map_sdk_error(e, bucket) {
                SourceError::NotFound(_) => SourceError::Config(format!("bucket not found: {bucket}")),
                other => other,
            })?;
        Ok(())
    }
}
