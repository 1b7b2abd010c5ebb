//! Proxy error types
//!
//! Client-input failures and upstream transport faults are kept apart so an
//! upstream non-200 answer can never be mistaken for either.

use thiserror::Error;

/// Failures caused by the inbound request; answered with a 4xx and never forwarded
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid JSON body")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Missing apiKey or prompt")]
    MissingFields,

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),
}

impl ProxyError {
    pub const fn status(&self) -> u16 {
        match self {
            Self::BodyTooLarge { .. } => 413,
            Self::InvalidJson(_) | Self::MissingFields | Self::BodyRead(_) => 400,
        }
    }
}

/// Failures while building, sending or reading the upstream call
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{}", describe_transport(.0))]
    Transport(#[source] reqwest::Error),
}

impl UpstreamError {
    /// Wrap a transport error, dropping the request URL (it carries the API key)
    pub fn transport(err: reqwest::Error) -> Self {
        Self::Transport(err.without_url())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

/// Render a reqwest error together with its causes, e.g.
/// `error sending request: client error (Connect): tcp connect error: Connection refused`
fn describe_transport(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    if err.is_timeout() && !message.contains("timed out") {
        message.push_str(" (timed out)");
    }
    message
}
