//! Status endpoint
//!
//! Serves the watched file's current contents through the status cache.

use crate::handler::router::RequestContext;
use crate::http::{self, HttpResponse};
use crate::logger;
use crate::watch::{StatusCache, StatusSnapshot};

/// `GET /api/status`: the document, `null` when the file is missing, or
/// `{"error": "..."}` when the last read failed. Always 200.
pub async fn serve_status(ctx: &RequestContext<'_>, cache: &StatusCache) -> HttpResponse {
    let snapshot = cache.load().await;

    let body = match &snapshot {
        StatusSnapshot::Document(entry) => serde_json::to_vec(&entry.document),
        other => serde_json::to_vec(&other.to_json()),
    };

    match body {
        Ok(json) => http::build_json_response(json, ctx.is_head),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize status: {e}"));
            let fallback = serde_json::json!({ "error": e.to_string() });
            http::build_json_response(fallback.to_string().into_bytes(), ctx.is_head)
        }
    }
}
