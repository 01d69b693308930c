//! Static file serving module
//!
//! Serves the dashboard page and its assets from a single static root.
//! Requests are confined to that root: relative paths that climb out of it
//! are refused before touching the filesystem, and resolved paths (after
//! symlinks) must still live under the canonical root.

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, HttpResponse};
use crate::logger;
use hyper::body::Bytes;
use percent_encoding::percent_decode_str;
use std::io;
use std::path::{Component, Path};
use tokio::fs;

/// Why an asset could not be served
#[derive(Debug, PartialEq, Eq)]
pub enum AssetError {
    /// The path tries to leave the static root
    Forbidden,
    NotFound,
}

/// A file loaded from the static root
#[derive(Debug)]
pub struct Asset {
    pub data: Bytes,
    pub content_type: &'static str,
}

/// `GET /`: the index page from the static root
pub async fn serve_index(
    ctx: &RequestContext<'_>,
    static_root: &Path,
    index_file: &str,
) -> HttpResponse {
    serve_asset(ctx, static_root, index_file).await
}

/// `GET /static/<relative>`: any file under the static root
pub async fn serve_asset(
    ctx: &RequestContext<'_>,
    static_root: &Path,
    relative: &str,
) -> HttpResponse {
    match load_asset(static_root, relative).await {
        Ok(asset) => {
            let etag = cache::generate_etag(&asset.data);
            if cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
                return http::build_304_response(&etag);
            }
            http::build_file_response(asset.data, asset.content_type, &etag, ctx.is_head)
        }
        Err(AssetError::Forbidden) => {
            logger::log_warning(&format!("Path traversal attempt blocked: {}", ctx.path));
            http::build_403_response()
        }
        Err(AssetError::NotFound) => http::build_404_response(),
    }
}

/// Resolve `relative` (percent-encoded, as taken from the URL) under
/// `static_root` and read it
pub async fn load_asset(static_root: &Path, relative: &str) -> Result<Asset, AssetError> {
    // Decode first so encoded separators and dots hit the same checks
    let relative = percent_decode_str(relative)
        .decode_utf8()
        .map_err(|_| AssetError::NotFound)?;
    let relative: &str = &relative;
    check_relative(relative)?;

    let root = match fs::canonicalize(static_root).await {
        Ok(root) => root,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                static_root.display()
            ));
            return Err(AssetError::NotFound);
        }
    };

    // File not found is common (404), no need to log it
    let resolved = fs::canonicalize(root.join(relative))
        .await
        .map_err(|_| AssetError::NotFound)?;
    if !resolved.starts_with(&root) {
        return Err(AssetError::Forbidden);
    }

    let metadata = fs::metadata(&resolved).await.map_err(|_| AssetError::NotFound)?;
    if !metadata.is_file() {
        return Err(AssetError::NotFound);
    }

    let data = fs::read(&resolved).await.map_err(|e| read_failed(&resolved, &e))?;
    Ok(Asset {
        data: Bytes::from(data),
        content_type: mime::content_type_for(&resolved),
    })
}

/// Reject anything but plain downward components
fn check_relative(relative: &str) -> Result<(), AssetError> {
    if relative.contains('\\') || relative.contains('\0') {
        return Err(AssetError::Forbidden);
    }
    let escapes = Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(AssetError::Forbidden);
    }
    Ok(())
}

fn read_failed(path: &Path, e: &io::Error) -> AssetError {
    logger::log_error(&format!("Failed to read file '{}': {e}", path.display()));
    AssetError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("static/js")).unwrap();
        std::fs::write(dir.path().join("static/index.html"), "<h1>ralph</h1>").unwrap();
        std::fs::write(dir.path().join("static/js/app.js"), "poll();").unwrap();
        std::fs::write(dir.path().join("static/my file.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
        dir
    }

    #[test]
    fn test_check_relative() {
        assert_eq!(check_relative("js/app.js"), Ok(()));
        assert_eq!(check_relative("./index.html"), Ok(()));
        assert_eq!(check_relative("../secret.txt"), Err(AssetError::Forbidden));
        assert_eq!(check_relative("js/../../secret.txt"), Err(AssetError::Forbidden));
        assert_eq!(check_relative("/etc/passwd"), Err(AssetError::Forbidden));
        assert_eq!(check_relative("..\\secret.txt"), Err(AssetError::Forbidden));
    }

    #[tokio::test]
    async fn test_load_asset_with_content_type() {
        let dir = static_root();
        let asset = load_asset(&dir.path().join("static"), "js/app.js").await.unwrap();
        assert_eq!(asset.data, Bytes::from_static(b"poll();"));
        assert_eq!(asset.content_type, "application/javascript; charset=utf-8");
    }

    #[tokio::test]
    async fn test_percent_encoded_names_are_decoded() {
        let dir = static_root();
        let root = dir.path().join("static");
        let asset = load_asset(&root, "my%20file.css").await.unwrap();
        assert_eq!(asset.data, Bytes::from_static(b"body{}"));
        let asset = load_asset(&root, "js%2Fapp.js").await.unwrap();
        assert_eq!(asset.data, Bytes::from_static(b"poll();"));

        for encoded in [
            "%2e%2e/secret.txt",
            "js/%2E%2E/%2e%2e/secret.txt",
            "..%2fsecret.txt",
            "..%5csecret.txt",
            "index.html%00",
        ] {
            let err = load_asset(&root, encoded).await.unwrap_err();
            assert_eq!(err, AssetError::Forbidden, "{encoded}");
        }
        assert_eq!(load_asset(&root, "%ff.css").await.unwrap_err(), AssetError::NotFound);
    }

    #[tokio::test]
    async fn test_missing_and_directory_are_not_found() {
        let dir = static_root();
        let root = dir.path().join("static");
        assert_eq!(load_asset(&root, "nope.css").await.unwrap_err(), AssetError::NotFound);
        assert_eq!(load_asset(&root, "js").await.unwrap_err(), AssetError::NotFound);
        assert_eq!(load_asset(&root, "").await.unwrap_err(), AssetError::NotFound);
    }

    #[tokio::test]
    async fn test_traversal_is_forbidden() {
        let dir = static_root();
        let root = dir.path().join("static");
        assert_eq!(
            load_asset(&root, "../secret.txt").await.unwrap_err(),
            AssetError::Forbidden
        );
        assert_eq!(
            load_asset(&root, "../../etc/passwd").await.unwrap_err(),
            AssetError::Forbidden
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_forbidden() {
        let dir = static_root();
        let root = dir.path().join("static");
        std::os::unix::fs::symlink(dir.path().join("secret.txt"), root.join("leak.txt")).unwrap();
        assert_eq!(
            load_asset(&root, "leak.txt").await.unwrap_err(),
            AssetError::Forbidden
        );
    }
}
