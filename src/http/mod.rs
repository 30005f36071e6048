//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from layer lookup and storage.

pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{parse_range_header, ByteRange, RangeRejection};
pub use response::{
    apply_cors_headers, build_404_response, build_405_response, build_error_response,
    build_head_response, build_health_response, build_json_response, build_options_response,
    build_partial_response, ResponseBody,
};
