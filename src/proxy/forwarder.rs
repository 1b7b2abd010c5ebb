//! Proxy forwarding
//!
//! Reads and validates a prompt request, sends it upstream and relays the
//! answer. Every outcome ends in a response; nothing is retried.

use super::error::{ProxyError, UpstreamError};
use super::request::ProxyRequest;
use super::upstream::{UpstreamClient, UpstreamResponse};
use crate::config::AppState;
use crate::http;
use crate::logger;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handle `POST` on the proxy path
pub async fn handle_ai_proxy<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let result = async {
        let body = read_body(req, state.config.proxy.max_body_size).await?;
        ProxyRequest::parse(&body, &state.config.upstream.default_model)
    }
    .await;

    match result {
        Ok(request) => forward(&request, &state.upstream).await,
        Err(err) => reject(&err),
    }
}

/// Send a validated request upstream and turn the outcome into a response
pub async fn forward(request: &ProxyRequest, upstream: &UpstreamClient) -> Response<Full<Bytes>> {
    logger::log_info(&format!(
        "[Proxy] Sending request to model: {} at {}",
        request.model,
        upstream.base_url()
    ));
    logger::log_info(&format!("[Proxy] Prompt: {}", request.prompt));

    match upstream.generate(request).await {
        Ok(response) => relay(response),
        Err(err) => upstream_failure(&err, upstream),
    }
}

fn relay(response: UpstreamResponse) -> Response<Full<Bytes>> {
    if !response.is_ok() {
        logger::log_warning(&format!(
            "[Proxy] Upstream returned {}: {}",
            response.status,
            String::from_utf8_lossy(&response.body)
        ));
    }
    http::build_json_response(response.status, response.body)
}

fn upstream_failure(err: &UpstreamError, upstream: &UpstreamClient) -> Response<Full<Bytes>> {
    if err.is_timeout() {
        logger::log_error(&format!(
            "[Proxy] Upstream call timed out after {}s: {err}",
            upstream.timeout().as_secs()
        ));
    } else {
        logger::log_error(&format!("[Proxy] Upstream call failed: {err}"));
    }
    let body = serde_json::json!({ "error": format!("Server error: {err}") });
    http::build_json_response(500, Bytes::from(body.to_string()))
}

fn reject(err: &ProxyError) -> Response<Full<Bytes>> {
    logger::log_warning(&format!("[Proxy] Rejected request: {err}"));
    match err {
        ProxyError::BodyTooLarge { .. } => http::build_413_response(),
        ProxyError::InvalidJson(_) | ProxyError::MissingFields | ProxyError::BodyRead(_) => {
            http::build_text_response(err.status(), err.to_string())
        }
    }
}

/// Collect the request body, refusing anything above `limit` bytes
async fn read_body<B>(req: Request<B>, limit: u64) -> Result<Bytes, ProxyError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let max = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(req.into_body(), max).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(ProxyError::BodyTooLarge { limit }),
        Err(e) => Err(ProxyError::BodyRead(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::proxy::mock_upstream::MockUpstream;

    fn state_for(base_url: &str, timeout_secs: u64) -> AppState {
        let mut config = Config::defaults().unwrap();
        config.upstream.base_url = base_url.to_string();
        config.upstream.timeout_secs = timeout_secs;
        AppState::new(config).unwrap()
    }

    fn post(body: &str) -> Request<Full<Bytes>> {
        Request::post("/ai-proxy")
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_of(resp: Response<Full<Bytes>>) -> (u16, Option<String>, Bytes) {
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, body)
    }

    const MOCK_OK: &str = r#"{"candidates":[{"content":{"parts":[{"text":"Mocked AI response"}]}}]}"#;

    #[tokio::test]
    async fn test_relays_success_verbatim() {
        let mock = MockUpstream::start(200, MOCK_OK).await;
        let state = state_for(&mock.base_url, 5);

        let resp = handle_ai_proxy(
            post(r#"{"apiKey":"k","prompt":"Hello AI","model":"test-model"}"#),
            &state,
        )
        .await;
        let (status, content_type, body) = body_of(resp).await;

        assert_eq!(status, 200);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body, Bytes::from_static(MOCK_OK.as_bytes()));

        let seen = mock.last_request().expect("upstream was called");
        assert_eq!(seen.path, "/v1beta/models/test-model:generateContent");
        assert_eq!(seen.query.as_deref(), Some("key=k"));
        let sent: serde_json::Value = serde_json::from_slice(&seen.body).unwrap();
        assert_eq!(sent["contents"][0]["parts"][0]["text"], "Hello AI");
    }

    #[tokio::test]
    async fn test_default_model_used() {
        let mock = MockUpstream::start(200, MOCK_OK).await;
        let state = state_for(&mock.base_url, 5);

        handle_ai_proxy(post(r#"{"apiKey":"k","prompt":"p"}"#), &state).await;

        let seen = mock.last_request().unwrap();
        assert_eq!(seen.path, "/v1beta/models/gemini-2.0-flash:generateContent");
    }

    #[tokio::test]
    async fn test_relays_upstream_error_status() {
        let error_body = r#"{"error":{"code":403,"message":"API key not valid"}}"#;
        let mock = MockUpstream::start(403, error_body).await;
        let state = state_for(&mock.base_url, 5);

        let resp = handle_ai_proxy(post(r#"{"apiKey":"bad","prompt":"p"}"#), &state).await;
        let (status, content_type, body) = body_of(resp).await;

        assert_eq!(status, 403);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body, Bytes::from_static(error_body.as_bytes()));
    }

    #[tokio::test]
    async fn test_missing_fields_never_reach_upstream() {
        let mock = MockUpstream::start(200, MOCK_OK).await;
        let state = state_for(&mock.base_url, 5);

        for payload in [
            "{}",
            r#"{"apiKey":"k"}"#,
            r#"{"prompt":"p"}"#,
            r#"{"apiKey":"","prompt":""}"#,
        ] {
            let (status, content_type, body) = body_of(handle_ai_proxy(post(payload), &state).await).await;
            assert_eq!(status, 400);
            assert_eq!(content_type.as_deref(), Some("text/plain"));
            assert_eq!(body, Bytes::from_static(b"Missing apiKey or prompt"));
        }
        assert_eq!(mock.hits(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let mock = MockUpstream::start(200, MOCK_OK).await;
        let state = state_for(&mock.base_url, 5);

        let (status, _, body) = body_of(handle_ai_proxy(post("{oops"), &state).await).await;
        assert_eq!(status, 400);
        assert_eq!(body, Bytes::from_static(b"Invalid JSON body"));
        assert_eq!(mock.hits(), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let mock = MockUpstream::start(200, MOCK_OK).await;
        let mut config = Config::defaults().unwrap();
        config.upstream.base_url = mock.base_url.clone();
        config.proxy.max_body_size = 16;
        let state = AppState::new(config).unwrap();

        let payload = format!(r#"{{"apiKey":"k","prompt":"{}"}}"#, "x".repeat(64));
        let (status, _, _) = body_of(handle_ai_proxy(post(&payload), &state).await).await;
        assert_eq!(status, 413);
        assert_eq!(mock.hits(), 0);
    }

    #[tokio::test]
    async fn test_connection_failure_is_500_json() {
        let base_url = MockUpstream::unreachable_base_url().await;
        let state = state_for(&base_url, 5);

        let resp = handle_ai_proxy(post(r#"{"apiKey":"secret","prompt":"p"}"#), &state).await;
        let (status, content_type, body) = body_of(resp).await;

        assert_eq!(status, 500);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let message = json["error"].as_str().unwrap();
        assert!(message.starts_with("Server error: "), "got {message}");
        assert!(!message.contains("secret"), "API key leaked: {message}");
    }

    #[tokio::test]
    async fn test_timeout_is_500_json() {
        let mock = MockUpstream::start_delayed(200, MOCK_OK, std::time::Duration::from_secs(3)).await;
        let state = state_for(&mock.base_url, 1);

        let resp = handle_ai_proxy(post(r#"{"apiKey":"k","prompt":"p"}"#), &state).await;
        let (status, _, body) = body_of(resp).await;

        assert_eq!(status, 500);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().starts_with("Server error: "));
    }

    #[tokio::test]
    async fn test_identical_requests_identical_responses() {
        let mock = MockUpstream::start(200, MOCK_OK).await;
        let state = state_for(&mock.base_url, 5);
        let payload = r#"{"apiKey":"k","prompt":"Hello AI","model":"test-model"}"#;

        let first = body_of(handle_ai_proxy(post(payload), &state).await).await;
        let second = body_of(handle_ai_proxy(post(payload), &state).await).await;

        assert_eq!(first, second);
        assert_eq!(mock.hits(), 2);
    }
}
