//! Local filesystem data source.

use super::{layer_file_name, ByteStream, DataSource, SourceError, SourceResult};
use crate::http::range::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::instrument;

/// Serves `{root}/{layer}.fgb` files.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    /// Canonical root, resolved once at construction
    root: PathBuf,
}

impl LocalFileSource {
    /// Create a source rooted at `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> SourceResult<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|e| {
            SourceError::Config(format!("data directory '{}' is not accessible: {e}", root.display()))
        })?;
        if !canonical.is_dir() {
            return Err(SourceError::Config(format!(
                "data directory '{}' is not a directory",
                root.display()
            )));
        }
        Ok(Self { root: canonical })
    }

    /// Resolve a layer to its file, refusing anything that escapes the root.
    async fn resolve(&self, layer: &str) -> SourceResult<PathBuf> {
        let path = self.root.join(layer_file_name(layer)?);

        // Follows symlinks, so a link inside the root pointing elsewhere is caught here
        let canonical = fs::canonicalize(&path)
            .await
            .map_err(|e| map_io_error(e, layer))?;
        if !canonical.starts_with(&self.root) {
            tracing::warn!(layer, resolved = %canonical.display(), "path escapes data directory");
            return Err(SourceError::InvalidLayer(layer.to_string()));
        }
        Ok(canonical)
    }
}

#[async_trait]
impl DataSource for LocalFileSource {
    #[instrument(skip(self), fields(backend = "local"))]
    async fn size_of(&self, layer: &str) -> SourceResult<u64> {
        let path = self.resolve(layer).await?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| map_io_error(e, layer))?;
        if !meta.is_file() {
            return Err(SourceError::NotFound(layer.to_string()));
        }
        Ok(meta.len())
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn stream_range(
        &self,
        layer: &str,
        range: ByteRange,
        chunk_size: usize,
    ) -> SourceResult<ByteStream> {
        let path = self.resolve(layer).await?;
        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| map_io_error(e, layer))?;
        file.seek(SeekFrom::Start(range.start)).await?;

        let chunk_size = chunk_size.max(1);
        let stream = async_stream::try_stream! {
            // The file handle lives in the stream and is closed when it is dropped
            let mut reader = file.take(range.length());
            loop {
                let chunk = read_chunk(&mut reader, chunk_size).await?;
                if chunk.is_empty() {
                    break;
                }
                yield chunk;
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Read until `want` bytes are buffered or the reader is exhausted.
async fn read_chunk<R>(reader: &mut R, want: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}

fn map_io_error(err: std::io::Error, layer: &str) -> SourceError {
    if err.kind() == std::io::ErrorKind::NotFound {
        SourceError::NotFound(layer.to_string())
    } else {
        SourceError::Io(err)
    }
}
