//! Upstream generative-language API client
//!
//! Builds `generateContent` calls and reports either the upstream answer
//! (any status) or a transport fault.

use super::error::UpstreamError;
use super::request::ProxyRequest;
use crate::config::UpstreamConfig;
use hyper::body::Bytes;
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;

const GENERATE_METHOD: &str = "generateContent";

/// Harm categories sent with every request, all set to [`BLOCK_NONE`]
pub const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub const BLOCK_NONE: &str = "BLOCK_NONE";

/// `generateContent` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentBody {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 600,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SafetySetting {
    pub category: &'static str,
    pub threshold: &'static str,
}

impl GenerateContentBody {
    pub fn for_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig::default(),
            safety_settings: SAFETY_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: BLOCK_NONE,
                })
                .collect(),
        }
    }
}

/// A fully built upstream call
///
/// `url` embeds the API key as the `key` query parameter and must not be logged.
pub struct UpstreamRequest {
    pub url: Url,
    pub body: GenerateContentBody,
}

impl UpstreamRequest {
    pub fn build(base_url: &str, request: &ProxyRequest) -> Result<Self, UpstreamError> {
        if request
            .model
            .chars()
            .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
        {
            return Err(UpstreamError::InvalidUrl(format!(
                "model name '{}' contains reserved characters",
                request.model
            )));
        }

        let endpoint = format!(
            "{}/{}:{GENERATE_METHOD}",
            base_url.trim_end_matches('/'),
            request.model
        );
        let mut url = Url::parse(&endpoint).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("key", &request.api_key);

        Ok(Self {
            url,
            body: GenerateContentBody::for_prompt(&request.prompt),
        })
    }
}

/// Upstream answer, relayed to the caller unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// HTTP client bound to one upstream base URL
pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one `generateContent` call; no retries
    pub async fn generate(&self, request: &ProxyRequest) -> Result<UpstreamResponse, UpstreamError> {
        let upstream = UpstreamRequest::build(&self.base_url, request)?;

        let response = self
            .http_client
            .post(upstream.url)
            .json(&upstream.body)
            .send()
            .await
            .map_err(UpstreamError::transport)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(UpstreamError::transport)?;

        Ok(UpstreamResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str) -> ProxyRequest {
        ProxyRequest {
            api_key: "k e/y".to_string(),
            prompt: "Hello AI".to_string(),
            model: model.to_string(),
        }
    }

    #[test]
    fn test_build_url() {
        let built = UpstreamRequest::build(
            "https://generativelanguage.googleapis.com/v1beta/models/",
            &request("gemini-2.0-flash"),
        )
        .unwrap();
        assert_eq!(
            built.url.path(),
            "/v1beta/models/gemini-2.0-flash:generateContent"
        );
        let key: Vec<_> = built.url.query_pairs().collect();
        assert_eq!(key.len(), 1);
        assert_eq!(key[0].0, "key");
        assert_eq!(key[0].1, "k e/y");
    }

    #[test]
    fn test_reserved_model_characters_rejected() {
        for model in ["a/b", "a?b", "a#b", "a b"] {
            let result = UpstreamRequest::build("http://localhost/v1beta/models", &request(model));
            assert!(matches!(result, Err(UpstreamError::InvalidUrl(_))));
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let result = UpstreamRequest::build("not a url", &request("m"));
        assert!(matches!(result, Err(UpstreamError::InvalidUrl(_))));
    }

    #[test]
    fn test_body_envelope() {
        let body = serde_json::to_value(GenerateContentBody::for_prompt("Hello AI")).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello AI");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);

        let generation = &body["generationConfig"];
        assert_eq!(generation["temperature"], 1.0);
        assert_eq!(generation["topK"], 1);
        assert_eq!(generation["topP"], 1.0);
        assert_eq!(generation["maxOutputTokens"], 600);

        let safety = body["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        for (setting, category) in safety.iter().zip(SAFETY_CATEGORIES) {
            assert_eq!(setting["category"], category);
            assert_eq!(setting["threshold"], "BLOCK_NONE");
        }
    }

    #[test]
    fn test_client_keeps_config() {
        let config = UpstreamConfig {
            base_url: "http://127.0.0.1:9/v1beta/models".to_string(),
            default_model: "m".to_string(),
            timeout_secs: 30,
        };
        let client = UpstreamClient::new(&config).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert_eq!(client.base_url(), "http://127.0.0.1:9/v1beta/models");
    }
}
