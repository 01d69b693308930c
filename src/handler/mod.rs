//! Request handler module
//!
//! Routes requests to the status endpoint, the dashboard page and its
//! static assets.

pub mod router;
pub mod static_files;
pub mod status;

// Re-export main entry point
pub use router::handle_request;
