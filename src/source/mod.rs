//! Layer data sources
//!
//! A [`DataSource`] presents one read contract over very different backends:
//! the size of a layer, and a lazy stream of chunks for an inclusive byte span.
//!
//! - [`LocalFileSource`] - flat directory of `{layer}.fgb` files
//! - [`RemoteObjectSource`] - flat object-store bucket of `{layer}.fgb` keys

pub mod chunk;
pub mod local;
pub mod remote;
pub mod s3;

pub use local::LocalFileSource;
pub use remote::{ObjectClient, RemoteObjectSource};
pub use s3::S3ObjectClient;

use crate::config::{DataSourceKind, StorageConfig};
use crate::http::range::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// File extension shared by on-disk files and object keys
pub const LAYER_EXTENSION: &str = "fgb";

/// A boxed, single-pass stream of byte chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = SourceResult<Bytes>> + Send>>;

/// Data source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("layer not found: {0}")]
    NotFound(String),

    #[error("invalid layer name: {0:?}")]
    InvalidLayer(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("stream ended early: expected {expected} bytes, received {received}")]
    ShortStream { expected: u64, received: u64 },

    #[error("stream produced more than the expected {expected} bytes")]
    Overrun { expected: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the error should be reported as a transient backend failure
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout(_) | Self::ShortStream { .. } | Self::Overrun { .. }
        )
    }
}

/// Result type for data source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Byte-addressable, read-only access to layers.
///
/// Implementations hold only immutable configuration and are shared across
/// concurrent requests without locking.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Size of the layer in bytes.
    async fn size_of(&self, layer: &str) -> SourceResult<u64>;

    /// Stream `range` of the layer as chunks of at most `chunk_size` bytes.
    ///
    /// The returned stream is finite and not restartable. Dropping it releases
    /// the underlying file handle or network body.
    async fn stream_range(
        &self,
        layer: &str,
        range: ByteRange,
        chunk_size: usize,
    ) -> SourceResult<ByteStream>;
}

/// Map a layer name to its file name / object key.
///
/// Names must be a single plain path segment: no separators, no parent or
/// hidden segments, no control characters.
pub fn layer_file_name(layer: &str) -> SourceResult<String> {
    let invalid = layer.is_empty()
        || layer.starts_with('.')
        || layer.contains("..")
        || layer.contains(['/', '\\'])
        || layer.chars().any(char::is_control);
    if invalid {
        return Err(SourceError::InvalidLayer(layer.to_string()));
    }
    Ok(format!("{layer}.{LAYER_EXTENSION}"))
}

/// Create a data source from configuration.
///
/// Both variants verify their backend here, so an unreachable bucket or a
/// missing root directory fails startup instead of every request.
pub async fn from_config(config: &StorageConfig) -> SourceResult<Arc<dyn DataSource>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.data_source {
        DataSourceKind::Local => {
            let source = LocalFileSource::new(&config.root_path)?;
            Ok(Arc::new(source))
        }
        DataSourceKind::Remote => {
            let bucket = config
                .bucket_name
                .clone()
                .ok_or_else(|| SourceError::Config("remote data source requires bucket_name".to_string()))?;
            let client = S3ObjectClient::new(config).await?;
            let source = RemoteObjectSource::new(Arc::new(client), bucket, timeout);
            source.verify_bucket().await?;
            Ok(Arc::new(source))
        }
    }
}
