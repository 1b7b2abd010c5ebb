// Application state module
// Immutable per-process state handed to every request handler

use super::types::Config;
use crate::proxy::{UpstreamClient, UpstreamError};

/// Application state
///
/// Built once at startup and shared read-only across connections.
pub struct AppState {
    pub config: Config,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, UpstreamError> {
        let upstream = UpstreamClient::new(&config.upstream)?;
        Ok(Self { config, upstream })
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }
}
