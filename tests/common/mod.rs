//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use fgbserve::config::{
    AppState, Config, HttpConfig, LimitsConfig, LoggingConfig, PerformanceConfig, ServerConfig,
    StorageConfig,
};
use fgbserve::http::ByteRange;
use fgbserve::source::{
    ByteStream, DataSource, LocalFileSource, ObjectClient, RemoteObjectSource, SourceError,
    SourceResult,
};
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const BUCKET: &str = "layers";
pub const LAYER: &str = "roads";
pub const LAYER_SIZE: usize = 10_000;

/// Deterministic, non-repeating-at-small-scale fixture bytes
pub fn fixture_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + 7) % 251) as u8).collect()
}

/// A temp directory holding `{name}.fgb` for every layer given
pub fn local_source(layers: &[(&str, &[u8])]) -> (TempDir, LocalFileSource) {
    let dir = tempfile::tempdir().unwrap();
    for (name, data) in layers {
        std::fs::write(dir.path().join(format!("{name}.fgb")), data).unwrap();
    }
    let source = LocalFileSource::new(dir.path()).unwrap();
    (dir, source)
}

/// In-memory object store whose bodies arrive in irregular transport buffers
pub struct MemoryObjectClient {
    objects: HashMap<String, Vec<u8>>,
    transport_chunks: Vec<usize>,
    /// Bytes withheld from the end of every body
    truncate_by: usize,
    /// Pause before each transport buffer
    delay: Option<Duration>,
}

impl MemoryObjectClient {
    pub fn new(layers: &[(&str, &[u8])]) -> Self {
        Self {
            objects: layers
                .iter()
                .map(|(name, data)| (format!("{name}.fgb"), data.to_vec()))
                .collect(),
            transport_chunks: vec![1000, 17, 4096, 3, 2500],
            truncate_by: 0,
            delay: None,
        }
    }

    /// Bodies end `bytes` short of what the range promised
    pub fn truncating(mut self, bytes: usize) -> Self {
        self.truncate_by = bytes;
        self
    }

    /// Bodies trickle in, one transport buffer per `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn head_object(&self, _bucket: &str, key: &str) -> SourceResult<u64> {
        self.objects
            .get(key)
            .map(|data| data.len() as u64)
            .ok_or_else(|| SourceError::NotFound(key.to_string()))
    }

    async fn get_object_range(
        &self,
        _bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> SourceResult<ByteStream> {
        let data = self
            .objects
            .get(key)
            .ok_or_else(|| SourceError::NotFound(key.to_string()))?;
        let start = range.start as usize;
        let end = (range.end as usize + 1).min(data.len());
        let end = end.saturating_sub(self.truncate_by).max(start);
        let mut body = &data[start..end];

        let mut pieces: Vec<SourceResult<Bytes>> = Vec::new();
        let mut sizes = self.transport_chunks.iter().cycle();
        while !body.is_empty() {
            let n = (*sizes.next().unwrap()).min(body.len());
            let (head, tail) = body.split_at(n);
            pieces.push(Ok(Bytes::copy_from_slice(head)));
            body = tail;
        }
        match self.delay {
            Some(delay) => Ok(stream::iter(pieces)
                .then(move |piece| async move {
                    tokio::time::sleep(delay).await;
                    piece
                })
                .boxed()),
            None => Ok(stream::iter(pieces).boxed()),
        }
    }

    async fn head_bucket(&self, _bucket: &str) -> SourceResult<()> {
        Ok(())
    }
}

/// Every call fails the way an unreachable or unauthorised store does
pub struct FailingObjectClient;

#[async_trait]
impl ObjectClient for FailingObjectClient {
    async fn head_object(&self, _bucket: &str, _key: &str) -> SourceResult<u64> {
        Err(SourceError::Unavailable("AccessDenied".to_string()))
    }

    async fn get_object_range(
        &self,
        _bucket: &str,
        _key: &str,
        _range: ByteRange,
    ) -> SourceResult<ByteStream> {
        Err(SourceError::Unavailable("AccessDenied".to_string()))
    }

    async fn head_bucket(&self, _bucket: &str) -> SourceResult<()> {
        Err(SourceError::Unavailable("AccessDenied".to_string()))
    }
}

pub fn remote_source(client: impl ObjectClient) -> RemoteObjectSource {
    RemoteObjectSource::new(Arc::new(client), BUCKET, Duration::from_secs(5))
}

/// Configuration with defaults equivalent to an empty config file
pub fn test_config(limits: LimitsConfig) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            workers: None,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            access_log: true,
            access_log_format: "combined".to_string(),
        },
        performance: PerformanceConfig {
            keep_alive_timeout: 75,
            read_timeout: 30,
            write_timeout: 30,
            max_connections: None,
        },
        http: HttpConfig {
            server_name: "fgbserve-test".to_string(),
            enable_cors: false,
        },
        storage: StorageConfig::default(),
        limits,
    }
}

pub fn app_state(source: impl DataSource, limits: LimitsConfig) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(limits), Arc::new(source)))
}

/// Drain a body stream, keeping chunk boundaries
pub async fn collect_chunks(mut body: ByteStream) -> SourceResult<Vec<Bytes>> {
    let mut chunks = Vec::new();
    while let Some(chunk) = body.next().await {
        chunks.push(chunk?);
    }
    Ok(chunks)
}
