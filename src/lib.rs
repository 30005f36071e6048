//! HTTP byte-range server for FlatGeobuf layers.
//!
//! Layers live either in a local directory or in an S3-compatible bucket and
//! are exposed as `/fgb/{layer}.fgb`, answering `HEAD` with the layer size and
//! single-range `GET` with a streamed `206 Partial Content` body.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod service;
pub mod source;
