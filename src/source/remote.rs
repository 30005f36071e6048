//! Remote object-store data source.

use super::chunk::{rechunk, with_chunk_timeout};
use super::{layer_file_name, ByteStream, DataSource, SourceError, SourceResult};
use crate::http::range::ByteRange;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Minimal object-store capability needed to serve layers.
///
/// Implementations map a missing object to [`SourceError::NotFound`] and every
/// other backend failure (auth, network, throttling) to
/// [`SourceError::Unavailable`]. Retries, if any, belong to the client.
#[async_trait]
pub trait ObjectClient: Send + Sync + 'static {
    /// Size of an object, without fetching its body.
    async fn head_object(&self, bucket: &str, key: &str) -> SourceResult<u64>;

    /// Body of `range` of an object, in whatever buffer sizes the transport produces.
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> SourceResult<ByteStream>;

    /// Check that the bucket exists and is reachable with the configured credentials.
    async fn head_bucket(&self, bucket: &str) -> SourceResult<()>;
}

/// Serves `{bucket}/{layer}.fgb` objects.
pub struct RemoteObjectSource {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    timeout: Duration,
}

impl std::fmt::Debug for RemoteObjectSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObjectSource")
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteObjectSource {
    /// `timeout` bounds the metadata fetch, the ranged fetch, and each body chunk.
    pub fn new(client: Arc<dyn ObjectClient>, bucket: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            timeout,
        }
    }

    /// Fail unless the bucket answers within the timeout.
    pub async fn verify_bucket(&self) -> SourceResult<()> {
        self.bounded(self.client.head_bucket(&self.bucket)).await
    }

    async fn bounded<T>(&self, fut: impl Future<Output = SourceResult<T>> + Send) -> SourceResult<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| SourceError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl DataSource for RemoteObjectSource {
    #[instrument(skip(self), fields(backend = "remote", bucket = %self.bucket))]
    async fn size_of(&self, layer: &str) -> SourceResult<u64> {
        let key = layer_file_name(layer)?;
        self.bounded(self.client.head_object(&self.bucket, &key))
            .await
            .map_err(|e| match e {
                SourceError::NotFound(_) => SourceError::NotFound(layer.to_string()),
                other => other,
            })
    }

    #[instrument(skip(self), fields(backend = "remote", bucket = %self.bucket))]
    async fn stream_range(
        &self,
        layer: &str,
        range: ByteRange,
        chunk_size: usize,
    ) -> SourceResult<ByteStream> {
        let key = layer_file_name(layer)?;
        let body = self
            .bounded(self.client.get_object_range(&self.bucket, &key, range))
            .await
            .map_err(|e| match e {
                SourceError::NotFound(_) => SourceError::NotFound(layer.to_string()),
                other => other,
            })?;

        Ok(rechunk(with_chunk_timeout(body, self.timeout), chunk_size))
    }
}
