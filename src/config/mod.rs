// Configuration module entry point
// Layers built-in defaults, an optional config file and the environment

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{
    Config, HttpConfig, LoggingConfig, PerformanceConfig, ProxyConfig, ServerConfig,
    StaticFilesConfig, UpstreamConfig,
};

/// Config file name (without extension) used when `APP_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "config";

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "APP_CONFIG";

/// Environment variable overriding the listening port
pub const PORT_ENV: &str = "APP_INTERNAL_PORT";

/// Environment variables overriding the upstream models URL, in priority order
pub const UPSTREAM_ENDPOINT_ENVS: [&str; 2] = ["GEMINI_API_ENDPOINT", "TEST_GEMINI_API_ENDPOINT"];

pub const DEFAULT_UPSTREAM_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

impl Config {
    /// Load configuration from `$APP_CONFIG` (default `config.toml`) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::default_builder()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .set_override_option("server.port", port_from_env()?)?
            .set_override_option(
                "upstream.base_url",
                upstream_endpoint_from(|name| std::env::var(name).ok()),
            )?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in defaults only, without file or environment sources
    pub fn defaults() -> Result<Self, config::ConfigError> {
        let cfg: Self = Self::default_builder()?.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn default_builder(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("static_files.web_root", ".")?
            .set_default("static_files.default_document", "index.html")?
            .set_default("proxy.path", "/ai-proxy")?
            .set_default("proxy.max_body_size", 1_048_576)? // 1MB
            .set_default("upstream.base_url", DEFAULT_UPSTREAM_BASE_URL)?
            .set_default("upstream.default_model", DEFAULT_MODEL)?
            .set_default("upstream.timeout_secs", 30)?
            .set_default("http.server_name", "spa-ai-proxy")?
            .set_default("http.enable_cors", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.connection_timeout", 75)
    }

    /// Reject values that would leave the server in an unusable state
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !self.proxy.path.starts_with('/') {
            return Err(invalid(format!(
                "proxy.path must start with '/': '{}'",
                self.proxy.path
            )));
        }
        if self.proxy.path == "/" {
            return Err(invalid("proxy.path must not be the root path".to_string()));
        }
        if self.static_files.default_document.trim().is_empty() {
            return Err(invalid("static_files.default_document is empty".to_string()));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(invalid("upstream.base_url is empty".to_string()));
        }
        if self.upstream.default_model.trim().is_empty() {
            return Err(invalid("upstream.default_model is empty".to_string()));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(invalid("upstream.timeout_secs must be positive".to_string()));
        }
        if self.performance.connection_timeout == 0 {
            return Err(invalid(
                "performance.connection_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

fn port_from_env() -> Result<Option<i64>, config::ConfigError> {
    match std::env::var(PORT_ENV) {
        Ok(raw) => raw
            .trim()
            .parse::<u16>()
            .map(|port| Some(i64::from(port)))
            .map_err(|e| invalid(format!("{PORT_ENV}='{raw}' is not a valid port: {e}"))),
        Err(_) => Ok(None),
    }
}

/// First non-empty value among [`UPSTREAM_ENDPOINT_ENVS`]
fn upstream_endpoint_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    UPSTREAM_ENDPOINT_ENVS
        .into_iter()
        .filter_map(lookup)
        .find(|value| !value.trim().is_empty())
}

fn invalid(message: String) -> config::ConfigError {
    config::ConfigError::Message(message)
}
