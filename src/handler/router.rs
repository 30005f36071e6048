//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method validation, route matching, and dispatching.

use crate::config::{AppState, DataSourceKind};
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use crate::service::{PartialContent, ServiceError};
use crate::source::chunk::on_finish;
use crate::source::ByteStream;
use hyper::body::Body as _;
use hyper::header::{HeaderValue, RANGE, SERVER, USER_AGENT};
use hyper::{Method, Request, Response, StatusCode, Version};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// URL prefix under which layers are served
pub const LAYER_PREFIX: &str = "/fgb/";
const LAYER_SUFFIX: &str = ".fgb";

const LIVENESS_PATH: &str = "/healthz";
const READINESS_PATH: &str = "/readyz";

/// A finished response, or a range whose body is still to be streamed
enum Routed {
    Done(Response<ResponseBody>),
    Partial(PartialContent),
}

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub range_header: Option<&'a str>,
}

/// Main entry point for HTTP request handling
///
/// Generic over the request body, which is never read.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();
    let method = req.method();
    let path = req.uri().path();

    let mut entry = AccessLogEntry::new(peer_addr.ip().to_string(), method.to_string(), path.to_string());
    entry.http_version = version_str(req.version()).to_string();
    entry.user_agent = header_str(&req, USER_AGENT).map(ToString::to_string);

    let ctx = RequestContext {
        path,
        is_head: *method == Method::HEAD,
        range_header: header_str(&req, RANGE),
    };
    entry.requested_range = ctx.range_header.map(ToString::to_string);

    // 1. Check HTTP method, then dispatch
    let routed = match check_http_method(method, state.config.http.enable_cors) {
        Some(resp) => Routed::Done(resp),
        None => route_request(&ctx, &state, &mut entry).await,
    };

    // 2. Access log: streamed bodies are logged once they finish
    let access_log = state.config.logging.access_log;
    let format = &state.config.logging.access_log_format;
    let mut response = match routed {
        Routed::Done(response) => {
            if access_log {
                entry.status = response.status().as_u16();
                entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
                entry.request_time_us = elapsed_us(started);
                logger::log_access(&entry, format);
            }
            response
        }
        Routed::Partial(mut content) => {
            if access_log {
                entry.status = StatusCode::PARTIAL_CONTENT.as_u16();
                content.body = log_when_finished(content.body, entry, format.clone(), started);
            }
            http::build_partial_response(content)
        }
    };

    // 3. Common response headers
    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, value);
    }
    if state.config.http.enable_cors {
        http::apply_cors_headers(&mut response);
    }

    Ok(response)
}

/// Emit the access event when the body ends, with the bytes actually sent
fn log_when_finished(
    body: ByteStream,
    mut entry: AccessLogEntry,
    format: String,
    started: Instant,
) -> ByteStream {
    on_finish(body, move |delivered| {
        entry.body_bytes = delivered.bytes;
        entry.request_time_us = elapsed_us(started);
        if !delivered.complete {
            tracing::warn!(
                layer = entry.layer.as_deref(),
                sent = delivered.bytes,
                "Response body ended before completion"
            );
        }
        logger::log_access(&entry, &format);
    })
}

fn elapsed_us(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<ResponseBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Route request based on path
async fn route_request(
    ctx: &RequestContext<'_>,
    state: &AppState,
    entry: &mut AccessLogEntry,
) -> Routed {
    // 0. Health check endpoints (highest priority, always fast)
    if ctx.path == LIVENESS_PATH || ctx.path == READINESS_PATH {
        return Routed::Done(http::build_health_response("ok"));
    }

    // 1. API info
    if ctx.path == "/" {
        return Routed::Done(http::build_json_response(&api_info(state), ctx.is_head));
    }

    // 2. Layers
    if let Some(layer) = layer_from_path(ctx.path) {
        entry.layer = Some(layer.to_string());
        return serve_layer(ctx, &layer, state, entry).await;
    }

    Routed::Done(http::build_404_response())
}

/// Extract and percent-decode `{layer}` from `/fgb/{layer}.fgb`
///
/// `None` when the path does not match or the name is not valid UTF-8.
/// Validating the decoded name is the data source's job.
pub fn layer_from_path(path: &str) -> Option<Cow<'_, str>> {
    let raw = path.strip_prefix(LAYER_PREFIX)?.strip_suffix(LAYER_SUFFIX)?;
    percent_decode_str(raw).decode_utf8().ok()
}

/// HEAD reports the size; GET streams the requested range
async fn serve_layer(
    ctx: &RequestContext<'_>,
    layer: &str,
    state: &AppState,
    entry: &mut AccessLogEntry,
) -> Routed {
    if ctx.is_head {
        return Routed::Done(match state.service.head(layer).await {
            Ok(descriptor) => http::build_head_response(&descriptor),
            Err(err) => reject(layer, &err),
        });
    }

    match state.service.get(layer, ctx.range_header).await {
        Ok(content) => {
            entry.served_range = Some(content.range);
            Routed::Partial(content)
        }
        Err(err) => Routed::Done(reject(layer, &err)),
    }
}

/// Log full error detail, answer with the public form only
fn reject(layer: &str, err: &ServiceError) -> Response<ResponseBody> {
    if err.status().is_server_error() {
        tracing::error!(layer, reason = err.reason(), "{err}");
    } else {
        tracing::debug!(layer, reason = err.reason(), "{err}");
    }
    http::build_error_response(err)
}

fn api_info(state: &AppState) -> serde_json::Value {
    let config = &state.config;
    let limits = state.service.limits();
    let bucket = match config.storage.data_source {
        DataSourceKind::Remote => config.storage.bucket_name.as_deref(),
        DataSourceKind::Local => None,
    };

    serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "data_source": config.storage.data_source.as_str(),
        "bucket": bucket,
        "endpoints": {
            "layer": format!("{LAYER_PREFIX}{{layer}}{LAYER_SUFFIX}"),
            "liveness": LIVENESS_PATH,
            "readiness": READINESS_PATH,
        },
        "max_range_bytes": limits.max_range_bytes,
        "chunk_size": limits.chunk_size,
        "log_level": config.logging.level,
    })
}

fn header_str<B>(req: &Request<B>, name: hyper::header::HeaderName) -> Option<&str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
