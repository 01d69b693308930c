//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, route
//! matching, shared headers and the access log.

use crate::config::AppState;
use crate::handler::{static_files, status};
use crate::http::{self, HttpResponse};
use crate::logger::{self, AccessLogEntry};
use hyper::body::Body;
use hyper::{HeaderMap, Method, Request};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

pub const STATUS_PATH: &str = "/api/status";
pub const STATIC_PREFIX: &str = "/static/";

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    // Keep only the head; the body is never read
    let (parts, _) = req.into_parts();

    let ctx = RequestContext {
        method: &parts.method,
        path: parts.uri.path(),
        is_head: parts.method == Method::HEAD,
        if_none_match: header_value(&parts.headers, "if-none-match"),
    };

    let response = route_request(&ctx, &state).await;

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            parts.method.to_string(),
            parts.uri.path().to_string(),
        );
        entry.query = parts.uri.query().map(ToString::to_string);
        entry.http_version = format!("{:?}", parts.version)
            .trim_start_matches("HTTP/")
            .to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.referer = header_value(&parts.headers, "referer");
        entry.user_agent = header_value(&parts.headers, "user-agent");
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route a request and stamp the shared headers on the result
pub async fn route_request(ctx: &RequestContext<'_>, state: &AppState) -> HttpResponse {
    let http_config = &state.config.http;

    let response = match check_http_method(ctx.method, http_config.enable_cors) {
        Some(resp) => resp,
        None => dispatch(ctx, state).await,
    };

    http::with_common_headers(response, &http_config.server_name, http_config.enable_cors)
}

async fn dispatch(ctx: &RequestContext<'_>, state: &AppState) -> HttpResponse {
    let http_config = &state.config.http;

    match ctx.path {
        STATUS_PATH => status::serve_status(ctx, &state.status).await,
        "/" => static_files::serve_index(ctx, &state.static_root, &http_config.index_file).await,
        path if !http_config.health_path.is_empty() && path == http_config.health_path => {
            http::build_health_response(ctx.is_head)
        }
        path => match path.strip_prefix(STATIC_PREFIX) {
            Some(relative) => static_files::serve_asset(ctx, &state.static_root, relative).await,
            None => http::build_404_response(),
        },
    }
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<HttpResponse> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::{BodyExt, Empty, Full};
    use hyper::body::Bytes;
    use hyper::StatusCode;
    use serde_json::Value;
    use std::fs::File;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        state: Arc<AppState>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let static_dir = dir.path().join("static");
            std::fs::create_dir_all(&static_dir).unwrap();
            std::fs::write(static_dir.join("index.html"), "<html>dashboard</html>").unwrap();
            std::fs::write(static_dir.join("app.css"), "body{}").unwrap();
            std::fs::write(dir.path().join("passwd"), "root:x:0:0").unwrap();

            let mut config = Config::default();
            config.watch.path = dir.path().join("ralph.json").display().to_string();
            config.http.static_dir = static_dir.display().to_string();
            config.logging.access_log = false;

            let state = Arc::new(AppState::new(&config));
            Self { dir, state }
        }

        fn watched(&self) -> std::path::PathBuf {
            self.dir.path().join("ralph.json")
        }

        fn write_status(&self, contents: &str, offset_secs: u64) {
            write_at(&self.watched(), contents, offset_secs);
        }

        async fn get(&self, path: &str) -> (StatusCode, hyper::HeaderMap, Bytes) {
            self.request(Method::GET, path, None).await
        }

        async fn request(
            &self,
            method: Method,
            path: &str,
            if_none_match: Option<&str>,
        ) -> (StatusCode, hyper::HeaderMap, Bytes) {
            let ctx = RequestContext {
                method: &method,
                path,
                is_head: method == Method::HEAD,
                if_none_match: if_none_match.map(ToString::to_string),
            };
            let response = route_request(&ctx, &self.state).await;
            let (parts, body) = response.into_parts();
            (parts.status, parts.headers, body.collect().await.unwrap().to_bytes())
        }

        async fn status_json(&self) -> Value {
            let (status, headers, body) = self.get(STATUS_PATH).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(headers["content-type"], "application/json");
            serde_json::from_slice(&body).unwrap()
        }
    }

    fn write_at(path: &Path, contents: &str, offset_secs: u64) {
        std::fs::write(path, contents).unwrap();
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + offset_secs);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_returns_exact_document() {
        let fx = Fixture::new();
        fx.write_status(r#"{"phase":"build","stories":[{"id":1,"passes":true}],"ratio":0.5}"#, 0);
        assert_eq!(
            fx.status_json().await,
            serde_json::json!({"phase": "build", "stories": [{"id": 1, "passes": true}], "ratio": 0.5})
        );
    }

    #[tokio::test]
    async fn test_status_missing_file_is_null_200() {
        let fx = Fixture::new();
        let (status, _, body) = fx.get(STATUS_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"null");
    }

    #[tokio::test]
    async fn test_status_invalid_json_then_keeps_serving() {
        let fx = Fixture::new();
        fx.write_status("{bad json", 0);
        let value = fx.status_json().await;
        assert!(value["error"].as_str().is_some_and(|m| !m.is_empty()));

        let (status, _, _) = fx.get("/").await;
        assert_eq!(status, StatusCode::OK);
        fx.write_status(r#"{"ok":true}"#, 1);
        assert_eq!(fx.status_json().await, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_status_scenario() {
        let fx = Fixture::new();

        fx.write_status(r#"{"a":1}"#, 0);
        assert_eq!(fx.status_json().await, serde_json::json!({"a": 1}));

        std::fs::remove_file(fx.watched()).unwrap();
        assert_eq!(fx.status_json().await, Value::Null);

        fx.write_status("{bad json", 1);
        assert!(fx.status_json().await.get("error").is_some());

        fx.write_status(r#"{"a":2}"#, 2);
        assert_eq!(fx.status_json().await, serde_json::json!({"a": 2}));
    }

    #[tokio::test]
    async fn test_status_served_from_cache() {
        let fx = Fixture::new();
        fx.write_status(r#"{"a":1}"#, 0);
        fx.status_json().await;
        fx.status_json().await;
        assert_eq!(fx.state.status.parse_count(), 1);
    }

    #[tokio::test]
    async fn test_index_and_assets() {
        let fx = Fixture::new();

        let (status, headers, body) = fx.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "text/html; charset=utf-8");
        assert_eq!(&body[..], b"<html>dashboard</html>");

        let (status, headers, body) = fx.get("/static/app.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "text/css; charset=utf-8");
        assert_eq!(&body[..], b"body{}");

        let (status, _, _) = fx.get("/static/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_asset_etag_revalidation() {
        let fx = Fixture::new();
        let (_, headers, _) = fx.get("/static/app.css").await;
        let etag = headers["etag"].to_str().unwrap().to_string();

        let (status, _, body) = fx.request(Method::GET, "/static/app.css", Some(&etag)).await;
        assert_eq!(status, StatusCode::NOT_MODIFIED);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_never_leaks() {
        let fx = Fixture::new();
        for path in [
            "/static/../passwd",
            "/static/../../etc/passwd",
            "/static/%2e%2e/passwd",
            "/static//etc/passwd",
            "/static/..%5cpasswd",
        ] {
            let (status, _, body) = fx.get(path).await;
            assert_ne!(status, StatusCode::OK, "{path} was served");
            assert!(!body.starts_with(b"root:"), "{path} leaked");
        }
        let (status, _, _) = fx.get("/static/../passwd").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _, _) = fx.get("/static/%2e%2e/passwd").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cors_and_methods() {
        let fx = Fixture::new();

        let (_, headers, _) = fx.get(STATUS_PATH).await;
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["server"], "ralph-dashboard");

        let (status, headers, _) = fx.request(Method::OPTIONS, STATUS_PATH, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(headers["access-control-allow-origin"], "*");

        let (status, _, _) = fx.request(Method::POST, STATUS_PATH, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let fx = Fixture::new();
        fx.write_status(r#"{"a":1}"#, 0);
        let (status, headers, body) = fx.request(Method::HEAD, STATUS_PATH, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-length"], "7");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_health_and_unknown_paths() {
        let fx = Fixture::new();
        let (status, _, body) = fx.get("/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"ok");

        let (status, _, _) = fx.get("/api/other").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handle_request_with_access_log() {
        let fx = Fixture::new();
        let mut config = fx.state.config.clone();
        config.logging.access_log = true;
        config.logging.access_log_format = "common".to_string();
        let state = Arc::new(AppState::new(&config));

        let req = Request::builder()
            .uri("/api/status?x=1")
            .header("user-agent", "test")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let response = handle_request(req, state, "127.0.0.1:4000".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Full<Bytes> = response.into_body();
        assert_eq!(&body.collect().await.unwrap().to_bytes()[..], b"null");
    }
}
