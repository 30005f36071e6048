mod common;

use common::{
    collect_chunks, fixture_bytes, local_source, remote_source, FailingObjectClient,
    MemoryObjectClient, LAYER, LAYER_SIZE,
};
use fgbserve::config::LimitsConfig;
use fgbserve::http::{ByteRange, RangeRejection};
use fgbserve::service::{ServiceError, StreamingService};
use fgbserve::source::{DataSource, SourceError};
use hyper::StatusCode;
use std::sync::Arc;

fn service(source: impl DataSource) -> StreamingService {
    StreamingService::new(Arc::new(source), LimitsConfig::default())
}

/// The same fixture behind both backends
fn both_backends(data: &[u8]) -> (tempfile::TempDir, Vec<(&'static str, StreamingService)>) {
    let (dir, local) = local_source(&[(LAYER, data)]);
    let remote = remote_source(MemoryObjectClient::new(&[(LAYER, data)]));
    (dir, vec![("local", service(local)), ("remote", service(remote))])
}

async fn body_of(service: &StreamingService, header: &str) -> Vec<u8> {
    let content = service.get(LAYER, Some(header)).await.unwrap();
    collect_chunks(content.body).await.unwrap().concat()
}

#[tokio::test]
async fn test_head_reports_size() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        let descriptor = service.head(LAYER).await.unwrap();
        assert_eq!(descriptor.size_bytes, 10_000, "{backend}");
        assert_eq!(descriptor.name, LAYER, "{backend}");
    }
}

#[tokio::test]
async fn test_first_kilobyte() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        let content = service.get(LAYER, Some("bytes=0-1023")).await.unwrap();
        assert_eq!(content.range, ByteRange { start: 0, end: 1023 }, "{backend}");
        assert_eq!(content.total_size, 10_000);
        assert_eq!(content.range.content_range(content.total_size), "bytes 0-1023/10000");
        let body = collect_chunks(content.body).await.unwrap().concat();
        assert_eq!(body, &data[..1024], "{backend}");
    }
}

#[tokio::test]
async fn test_end_clamped_to_size() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        let content = service.get(LAYER, Some("bytes=9990-20000")).await.unwrap();
        assert_eq!(content.range, ByteRange { start: 9990, end: 9999 }, "{backend}");
        let body = collect_chunks(content.body).await.unwrap().concat();
        assert_eq!(body, &data[9990..], "{backend}");
    }
}

#[tokio::test]
async fn test_open_ended_and_suffix_ranges() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        assert_eq!(body_of(&service, "bytes=9000-").await, &data[9000..], "{backend}");
        assert_eq!(body_of(&service, "bytes=-500").await, &data[9500..], "{backend}");
        assert_eq!(body_of(&service, "bytes=42-42").await, &data[42..43], "{backend}");
    }
}

#[tokio::test]
async fn test_start_at_size_is_unsatisfiable() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        let err = service.get(LAYER, Some("bytes=10000-10005")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{backend}");
        assert_eq!(err.unsatisfied_size(), Some(10_000), "{backend}");
    }
}

#[tokio::test]
async fn test_missing_range_is_bad_request() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        let err = service.get(LAYER, None).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::Range { rejection: RangeRejection::Malformed(_), .. }),
            "{backend}: {err:?}"
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_range_over_limit_is_rejected() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, local) = local_source(&[(LAYER, &data)]);
    let limits = LimitsConfig {
        max_range_bytes: 4096,
        chunk_size: 1024,
    };
    let service = StreamingService::new(Arc::new(local), limits);

    assert!(service.get(LAYER, Some("bytes=0-4095")).await.is_ok());
    let err = service.get(LAYER, Some("bytes=0-4096")).await.unwrap_err();
    assert_eq!(err.reason(), "range_too_large");
    assert_eq!(err.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_traversal_is_not_found() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        for layer in ["../roads", "..", "a/../../etc/passwd", ""] {
            let err = service.head(layer).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{backend}: {layer:?}");
            let err = service.get(layer, Some("bytes=0-10")).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{backend}: {layer:?}");
        }
    }
}

#[tokio::test]
async fn test_unknown_layer_is_not_found() {
    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        let err = service.get("rivers", Some("bytes=0-10")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref name) if name == "rivers"), "{backend}");
    }
}

#[tokio::test]
async fn test_unavailable_backend() {
    let service = service(remote_source(FailingObjectClient));
    let err = service.head(LAYER).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err.reason(), "source_unavailable");
    // Backend detail stays out of the client-facing message
    assert!(!err.public_message().contains("AccessDenied"));
}

#[tokio::test]
async fn test_short_backend_body_is_an_error() {
    let data = fixture_bytes(LAYER_SIZE);
    let client = MemoryObjectClient::new(&[(LAYER, &data)]).truncating(24);
    let service = service(remote_source(client));

    let content = service.get(LAYER, Some("bytes=0-1023")).await.unwrap();
    let err = collect_chunks(content.body).await.unwrap_err();
    assert!(
        matches!(err, SourceError::ShortStream { expected: 1024, received: 1000 }),
        "{err:?}"
    );
    assert_eq!(ServiceError::from(err).status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_file_truncated_after_size_check() {
    let data = fixture_bytes(LAYER_SIZE);
    let (dir, local) = local_source(&[(LAYER, &data)]);
    let service = service(local);

    let content = service.get(LAYER, Some("bytes=0-9999")).await.unwrap();
    std::fs::write(dir.path().join("roads.fgb"), &data[..5000]).unwrap();

    let err = collect_chunks(content.body).await.unwrap_err();
    assert!(matches!(err, SourceError::ShortStream { expected: 10_000, .. }), "{err:?}");
}

#[tokio::test]
async fn test_dropping_body_early_is_harmless() {
    use futures::StreamExt;

    let data = fixture_bytes(LAYER_SIZE);
    let (_dir, services) = both_backends(&data);
    for (backend, service) in services {
        let mut content = service.get(LAYER, Some("bytes=0-9999")).await.unwrap();
        let first = content.body.next().await.unwrap().unwrap();
        assert!(!first.is_empty(), "{backend}");
        drop(content);

        // The source keeps serving after a client disconnects mid-body
        assert_eq!(body_of(&service, "bytes=0-99").await, &data[..100], "{backend}");
    }
}
