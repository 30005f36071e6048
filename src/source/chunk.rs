//! Chunk stream adapters
//!
//! Backends hand out buffers of whatever size their transport produces. These
//! adapters normalise that into uniform chunks, bound the wait for each chunk,
//! and check that a stream delivers exactly the bytes it promised.

use super::{ByteStream, SourceError};
use bytes::BytesMut;
use futures::StreamExt;
use std::time::Duration;

/// Re-chunk `inner` into pieces of exactly `chunk_size` bytes.
///
/// Only the final chunk may be shorter. At most one chunk plus one backend
/// buffer is held in memory.
pub fn rechunk(mut inner: ByteStream, chunk_size: usize) -> ByteStream {
    let chunk_size = chunk_size.max(1);
    let stream = async_stream::try_stream! {
        let mut pending = BytesMut::with_capacity(chunk_size);
        while let Some(piece) = inner.next().await {
            pending.extend_from_slice(&piece?);
            while pending.len() >= chunk_size {
                yield pending.split_to(chunk_size).freeze();
            }
        }
        if !pending.is_empty() {
            yield pending.freeze();
        }
    };
    Box::pin(stream)
}

/// Fail the stream with [`SourceError::Timeout`] when any single chunk takes
/// longer than `timeout` to arrive.
pub fn with_chunk_timeout(mut inner: ByteStream, timeout: Duration) -> ByteStream {
    let stream = async_stream::try_stream! {
        loop {
            let next = tokio::time::timeout(timeout, inner.next())
                .await
                .map_err(|_| SourceError::Timeout(timeout))?;
            match next {
                Some(piece) => yield piece?,
                None => break,
            }
        }
    };
    Box::pin(stream)
}

/// Pass through `inner`, erroring if it yields fewer or more than `expected` bytes.
///
/// A short stream is reported as [`SourceError::ShortStream`] instead of
/// ending quietly, so a truncated body is never mistaken for a complete one.
pub fn exact_length(mut inner: ByteStream, expected: u64) -> ByteStream {
    let stream = async_stream::try_stream! {
        let mut received: u64 = 0;
        while let Some(piece) = inner.next().await {
            let piece = piece?;
            received += piece.len() as u64;
            if received > expected {
                Err::<(), _>(SourceError::Overrun { expected })?;
            }
            yield piece;
        }
        if received < expected {
            Err::<(), _>(SourceError::ShortStream { expected, received })?;
        }
    };
    Box::pin(stream)
}

/// How much of a body reached its consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    pub bytes: u64,
    /// The inner stream ended without error
    pub complete: bool,
}

struct FinishGuard<F: FnOnce(Delivered)> {
    delivered: Delivered,
    callback: Option<F>,
}

impl<F: FnOnce(Delivered)> Drop for FinishGuard<F> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(self.delivered);
        }
    }
}

/// Pass through `inner`, calling `callback` exactly once when the stream ends,
/// fails, or is dropped, even if it was never polled.
pub fn on_finish<F>(mut inner: ByteStream, callback: F) -> ByteStream
where
    F: FnOnce(Delivered) + Send + 'static,
{
    let mut guard = FinishGuard {
        delivered: Delivered {
            bytes: 0,
            complete: false,
        },
        callback: Some(callback),
    };
    let stream = async_stream::try_stream! {
        // Capture the whole guard (not just its Copy fields) so Drop sees updates
        let _ = &guard;
        while let Some(piece) = inner.next().await {
            let piece = piece?;
            guard.delivered.bytes += piece.len() as u64;
            yield piece;
        }
        guard.delivered.complete = true;
    };
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceResult;
    use bytes::Bytes;
    use futures::stream;

    fn from_pieces(pieces: &[&'static [u8]]) -> ByteStream {
        let items: Vec<SourceResult<Bytes>> =
            pieces.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(stream::iter(items))
    }

    async fn collect_ok(s: ByteStream) -> Vec<Bytes> {
        s.map(|r| r.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_rechunk_uniform_sizes() {
        let chunks = collect_ok(rechunk(from_pieces(&[b"ab", b"cdefg", b"h", b"ijk"]), 3)).await;
        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![3, 3, 3, 2]);
        assert_eq!(chunks.concat(), b"abcdefghijk");
    }

    #[tokio::test]
    async fn test_rechunk_splits_oversized_buffers() {
        let chunks = collect_ok(rechunk(from_pieces(&[b"0123456789"]), 4)).await;
        assert_eq!(chunks, vec![Bytes::from("0123"), Bytes::from("4567"), Bytes::from("89")]);
    }

    #[tokio::test]
    async fn test_rechunk_empty_input() {
        assert!(collect_ok(rechunk(from_pieces(&[]), 4)).await.is_empty());
    }

    #[tokio::test]
    async fn test_rechunk_propagates_errors() {
        let items: Vec<SourceResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"abcd")),
            Err(SourceError::Unavailable("connection reset".into())),
        ];
        let mut s = rechunk(Box::pin(stream::iter(items)), 3);
        assert_eq!(s.next().await.unwrap().unwrap(), Bytes::from("abc"));
        assert!(matches!(s.next().await, Some(Err(SourceError::Unavailable(_)))));
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn test_exact_length_ok() {
        let chunks = collect_ok(exact_length(from_pieces(&[b"abc", b"de"]), 5)).await;
        assert_eq!(chunks.concat(), b"abcde");
    }

    #[tokio::test]
    async fn test_exact_length_short_stream() {
        let results: Vec<_> = exact_length(from_pieces(&[b"abc"]), 5).collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SourceError::ShortStream { expected: 5, received: 3 })
        ));
    }

    #[tokio::test]
    async fn test_exact_length_overrun() {
        let results: Vec<_> = exact_length(from_pieces(&[b"abc", b"def"]), 4).collect().await;
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SourceError::Overrun { expected: 4 })));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_timeout() {
        let stalled: ByteStream = Box::pin(
            stream::iter(vec![Ok(Bytes::from_static(b"ok"))]).chain(stream::pending()),
        );
        let mut s = with_chunk_timeout(stalled, Duration::from_secs(5));
        assert_eq!(s.next().await.unwrap().unwrap(), Bytes::from("ok"));
        assert!(matches!(s.next().await, Some(Err(SourceError::Timeout(_)))));
        assert!(s.next().await.is_none());
    }

    async fn delivered_after(stream: ByteStream, pulls: usize) -> Delivered {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let mut s = on_finish(stream, move |d| {
            let _ = tx.send(d);
        });
        for _ in 0..pulls {
            let _ = s.next().await;
        }
        drop(s);
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_on_finish_complete_body() {
        let delivered = delivered_after(from_pieces(&[b"abc", b"de"]), 3).await;
        assert_eq!(delivered, Delivered { bytes: 5, complete: true });
    }

    #[tokio::test]
    async fn test_on_finish_reports_short_body() {
        let short = exact_length(from_pieces(&[b"abc"]), 10);
        let delivered = delivered_after(short, 3).await;
        assert_eq!(delivered, Delivered { bytes: 3, complete: false });
    }

    #[tokio::test]
    async fn test_on_finish_reports_early_drop() {
        let delivered = delivered_after(from_pieces(&[b"abc", b"def", b"ghi"]), 1).await;
        assert_eq!(delivered, Delivered { bytes: 3, complete: false });
    }

    #[tokio::test]
    async fn test_on_finish_called_when_never_polled() {
        let delivered = delivered_after(from_pieces(&[b"abc"]), 0).await;
        assert_eq!(delivered, Delivered { bytes: 0, complete: false });
    }
}
