//! AI proxy module
//!
//! Forwards prompt requests to the generative-language API so the browser
//! never talks to it directly.

mod error;
pub mod forwarder;
pub mod request;
pub mod upstream;

#[cfg(test)]
#[path = "../../tests/common/mock_upstream.rs"]
pub(crate) mod mock_upstream;

pub use error::{ProxyError, UpstreamError};
pub use forwarder::handle_ai_proxy;
pub use request::ProxyRequest;
pub use upstream::{UpstreamClient, UpstreamRequest, UpstreamResponse};
