//! Request handler module
//!
//! Responsible for request routing dispatch and turning service results into responses.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
