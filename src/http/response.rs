//! HTTP response building module
//!
//! Provides builders for every status the server emits, decoupled from request handling.

use crate::service::{LayerDescriptor, PartialContent, ServiceError};
use crate::source::SourceError;
use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::header::{HeaderValue, ACCEPT_RANGES, ALLOW, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use hyper::{Response, StatusCode};

/// Body type for all responses: either buffered bytes or a streamed layer range
pub type ResponseBody = UnsyncBoxBody<Bytes, SourceError>;

/// Content type for layer bytes
pub const OCTET_STREAM: &str = "application/octet-stream";

const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Build 200 response for HEAD: size and range support, no body
pub fn build_head_response(layer: &LayerDescriptor) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, OCTET_STREAM)
        .header(CONTENT_LENGTH, layer.size_bytes)
        .header(ACCEPT_RANGES, "bytes")
        .body(empty_body())
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(empty_body())
        })
}

/// Build 206 Partial Content response streaming the range body
pub fn build_partial_response(content: PartialContent) -> Response<ResponseBody> {
    let PartialContent {
        range,
        total_size,
        body,
    } = content;

    let body = StreamBody::new(body.map_ok(Frame::data)).boxed_unsync();

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(CONTENT_TYPE, OCTET_STREAM)
        .header(CONTENT_LENGTH, range.length())
        .header(CONTENT_RANGE, range.content_range(total_size))
        .header(ACCEPT_RANGES, "bytes")
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("206", &e);
            error_fallback()
        })
}

/// Build error response with a JSON `{error, message}` body
///
/// 416 responses also carry `Content-Range: bytes */{size}`.
pub fn build_error_response(err: &ServiceError) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(err.status())
        .header(CONTENT_TYPE, "application/json");

    if let Some(size) = err.unsatisfied_size() {
        builder = builder.header(CONTENT_RANGE, format!("bytes */{size}"));
    }

    builder
        .body(full_body(error_json(err.reason(), &err.public_message())))
        .unwrap_or_else(|e| {
            log_build_error(err.status().as_str(), &e);
            error_fallback()
        })
}

/// Build 404 Not Found response for paths outside the API
pub fn build_404_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(error_json("not_found", "Not Found")))
        .unwrap_or_else(|e| {
            log_build_error("404", &e);
            error_fallback()
        })
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, "application/json")
        .header(ALLOW, ALLOWED_METHODS)
        .body(full_body(error_json("method_not_allowed", "Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            error_fallback()
        })
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .header("Access-Control-Allow-Headers", "Content-Type, Range")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(empty_body()).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(empty_body())
    })
}

/// Add CORS headers to a regular response so browsers may read range metadata
pub fn apply_cors_headers(response: &mut Response<ResponseBody>) {
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Expose-Headers",
        HeaderValue::from_static("Content-Length, Content-Range, Accept-Ranges"),
    );
}

/// Build health check response
pub fn build_health_response(status: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain")
        .body(full_body(status))
        .unwrap_or_else(|e| {
            log_build_error("health", &e);
            Response::new(full_body(status))
        })
}

/// Build 200 JSON response (HEAD gets headers only)
pub fn build_json_response(value: &serde_json::Value, is_head: bool) -> Response<ResponseBody> {
    let content = value.to_string();
    let content_length = content.len();
    let body = if is_head {
        empty_body()
    } else {
        full_body(content)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, content_length)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("JSON", &e);
            error_fallback()
        })
}

fn error_json(reason: &str, message: &str) -> String {
    serde_json::json!({ "error": reason, "message": message }).to_string()
}

fn error_fallback() -> Response<ResponseBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
