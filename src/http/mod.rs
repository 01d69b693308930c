//! HTTP protocol layer module
//!
//! Response builders, MIME detection and cache validation, independent of
//! what the dashboard serves.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_304_response, build_403_response, build_404_response, build_405_response,
    build_file_response, build_health_response, build_json_response, build_options_response,
    with_common_headers, HttpResponse,
};
