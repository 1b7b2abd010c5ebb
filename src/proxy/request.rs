//! Inbound proxy request parsing and validation

use super::error::ProxyError;
use serde::Deserialize;
use std::fmt;

/// JSON body accepted on the proxy endpoint
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProxyRequest {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

/// A validated prompt request
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// Opaque upstream credential; never logged
    pub api_key: String,
    pub prompt: String,
    pub model: String,
}

impl ProxyRequest {
    /// Parse a request body, substituting `default_model` when none is given
    pub fn parse(body: &[u8], default_model: &str) -> Result<Self, ProxyError> {
        let raw: RawProxyRequest = serde_json::from_slice(body).map_err(ProxyError::InvalidJson)?;

        let api_key = raw.api_key.filter(|k| !k.is_empty());
        let prompt = raw.prompt.filter(|p| !p.is_empty());
        let (Some(api_key), Some(prompt)) = (api_key, prompt) else {
            return Err(ProxyError::MissingFields);
        };

        let model = raw
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model.to_string());

        Ok(Self {
            api_key,
            prompt,
            model,
        })
    }
}

impl fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("api_key", &"<redacted>")
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .finish()
    }
}
