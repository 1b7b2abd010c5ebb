//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: picks exactly one of the static
//! file resolver or the proxy forwarder per request.

use crate::config::AppState;
use crate::handler::static_files;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::proxy;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, SERVER};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let access_entry = state
        .access_log_enabled()
        .then(|| AccessLogEntry::from_request(&req, peer_addr));

    logger::log_debug(&format!(
        "[Request] {} {} {:?} ({} headers)",
        req.method(),
        req.uri().path(),
        req.version(),
        req.headers().len()
    ));

    let mut response = dispatch(req, &state).await;

    if let Ok(server_name) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server_name);
    }

    if let Some(mut entry) = access_entry {
        entry.complete(&response, started.elapsed());
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let enable_cors = state.config.http.enable_cors;
    let method = req.method().clone();

    if req.uri().path() == state.config.proxy.path {
        return match method {
            Method::POST => {
                if let Some(resp) = check_body_size(&req, state.config.proxy.max_body_size) {
                    return resp;
                }
                proxy::handle_ai_proxy(req, state).await
            }
            Method::OPTIONS => http::build_options_response(enable_cors),
            other => method_not_allowed(&other),
        };
    }

    match method {
        Method::GET | Method::HEAD => {
            let is_head = method == Method::HEAD;
            static_files::serve(req.uri().path(), is_head, &state.config.static_files).await
        }
        Method::OPTIONS => http::build_options_response(enable_cors),
        other => method_not_allowed(&other),
    }
}

fn method_not_allowed(method: &Method) -> Response<Full<Bytes>> {
    logger::log_warning(&format!("Method not allowed: {method}"));
    http::build_405_response()
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}
