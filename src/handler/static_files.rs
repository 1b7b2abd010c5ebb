//! Static file serving module
//!
//! Resolves request paths under the web root, substitutes the default
//! document for `/`, and blocks anything that escapes the root.

use crate::config::StaticFilesConfig;
use crate::http::{self, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A file loaded from the web root
#[derive(Debug)]
pub struct StaticFile {
    pub path: PathBuf,
    pub content: Bytes,
    pub content_type: &'static str,
}

/// Serve a `GET`/`HEAD` request from the web root
pub async fn serve(path: &str, is_head: bool, config: &StaticFilesConfig) -> Response<Full<Bytes>> {
    match load_file(&config.web_root, path, &config.default_document).await {
        Some(file) => {
            logger::log_debug(&format!("[Static] {} -> {}", path, file.path.display()));
            http::build_file_response(file.content, file.content_type, is_head)
        }
        None => http::build_404_response(),
    }
}

/// Map a URL path to a path relative to the web root
///
/// The path is percent-decoded first. `/` becomes the default document; other
/// paths lose their leading slashes. Paths that decode to invalid UTF-8 or
/// contain NUL resolve to nothing.
pub fn resolve_request_path(path: &str, default_document: &str) -> Option<String> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }

    let relative = if decoded == "/" {
        default_document.trim_start_matches('/')
    } else {
        decoded.trim_start_matches('/')
    };
    Some(relative.to_string())
}

/// Load a file from the web root
pub async fn load_file(web_root: &str, path: &str, default_document: &str) -> Option<StaticFile> {
    let relative = resolve_request_path(path, default_document)?;
    if relative.is_empty() {
        return None;
    }

    let root = match fs::canonicalize(web_root).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Web root not found or inaccessible '{web_root}': {e}"
            ));
            return None;
        }
    };

    // File not found is common (404), no need to log at warning level
    let Ok(canonical) = fs::canonicalize(root.join(&relative)).await else {
        return None;
    };
    if !canonical.starts_with(&root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            path,
            canonical.display()
        ));
        return None;
    }

    match fs::metadata(&canonical).await {
        Ok(meta) if meta.is_file() => {}
        _ => return None,
    }

    let content = match fs::read(&canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                canonical.display(),
                e
            ));
            return None;
        }
    };

    // Content type follows the requested name, not a symlink target
    let content_type = mime::content_type_for(Path::new(&relative));

    Some(StaticFile {
        path: canonical,
        content: Bytes::from(content),
        content_type,
    })
}
