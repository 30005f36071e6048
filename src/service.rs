//! Range streaming service
//!
//! Turns a layer name plus an optional Range header into either a validated
//! partial-content body or a typed error carrying its HTTP status.

use crate::config::LimitsConfig;
use crate::http::range::{parse_range_header, ByteRange, RangeRejection};
use crate::source::chunk::exact_length;
use crate::source::{ByteStream, DataSource, SourceError};
use hyper::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Layer existence and size, as reported for HEAD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub name: String,
    pub size_bytes: u64,
}

/// A validated range and the lazy body that serves it
pub struct PartialContent {
    pub range: ByteRange,
    pub total_size: u64,
    /// Yields exactly `range.length()` bytes or ends with an error
    pub body: ByteStream,
}

impl std::fmt::Debug for PartialContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialContent")
            .field("range", &self.range)
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

/// Service errors, each mapped to one HTTP status
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("layer not found: {0}")]
    NotFound(String),

    #[error("{rejection}")]
    Range { rejection: RangeRejection, size: u64 },

    #[error("source unavailable: {0}")]
    SourceUnavailable(#[source] SourceError),

    #[error("internal error: {0}")]
    Internal(#[source] SourceError),
}

impl From<SourceError> for ServiceError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(name) | SourceError::InvalidLayer(name) => Self::NotFound(name),
            e if e.is_unavailable() => Self::SourceUnavailable(e),
            e => Self::Internal(e),
        }
    }
}

impl ServiceError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Range {
                rejection: RangeRejection::Malformed(_),
                ..
            } => StatusCode::BAD_REQUEST,
            Self::Range { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-parseable reason, stable across releases
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Range { rejection, .. } => match rejection {
                RangeRejection::Malformed(_) => "malformed_range",
                RangeRejection::Unsatisfiable { .. } => "range_not_satisfiable",
                RangeRejection::TooLarge { .. } => "range_too_large",
            },
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show to clients; backend detail stays in the log
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound(_) => "Layer not found".to_string(),
            Self::Range { rejection, .. } => rejection.to_string(),
            Self::SourceUnavailable(_) => "Storage backend unavailable".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Total size to advertise in `Content-Range: bytes */{size}`, for 416 only
    pub const fn unsatisfied_size(&self) -> Option<u64> {
        match self {
            Self::Range {
                rejection: RangeRejection::Unsatisfiable { .. } | RangeRejection::TooLarge { .. },
                size,
            } => Some(*size),
            _ => None,
        }
    }
}

/// Orchestrates HEAD and ranged GET over one [`DataSource`].
///
/// Holds no per-request state; one instance serves all connections.
pub struct StreamingService {
    source: Arc<dyn DataSource>,
    limits: LimitsConfig,
}

impl StreamingService {
    pub fn new(source: Arc<dyn DataSource>, limits: LimitsConfig) -> Self {
        Self { source, limits }
    }

    pub const fn limits(&self) -> LimitsConfig {
        self.limits
    }

    /// Existence and size only; never looks at a Range header.
    pub async fn head(&self, layer: &str) -> Result<LayerDescriptor, ServiceError> {
        let size_bytes = self.source.size_of(layer).await?;
        Ok(LayerDescriptor {
            name: layer.to_string(),
            size_bytes,
        })
    }

    /// Resolve size, validate the Range header against it, and open the body.
    ///
    /// The body is guarded so that fewer (or more) bytes than the range
    /// promised surface as an error, never as a complete response.
    pub async fn get(
        &self,
        layer: &str,
        range_header: Option<&str>,
    ) -> Result<PartialContent, ServiceError> {
        let size = self.source.size_of(layer).await?;

        let range = parse_range_header(range_header, size, self.limits.max_range_bytes)
            .map_err(|rejection| ServiceError::Range { rejection, size })?;

        let body = self
            .source
            .stream_range(layer, range, self.limits.chunk_size)
            .await?;

        Ok(PartialContent {
            range,
            total_size: size,
            body: exact_length(body, range.length()),
        })
    }
}
