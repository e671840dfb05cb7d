//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;

/// API origin used when `CLOUDSHIELD_API_URL` is not set
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API origin (e.g. `http://localhost:8000`)
    pub api_base_url: String,

    /// Real-time origin, derived from `api_base_url` by swapping the scheme
    pub ws_base_url: String,

    /// Session file location (token + user profile)
    pub session_path: PathBuf,

    /// Per-request HTTP timeout
    pub http_timeout: Duration,

    /// Live feed connect timeout
    pub ws_connect_timeout: Duration,

    /// Capacity of the live feed event channel
    pub feed_buffer: usize,

    /// Rolling buffer size for recent logs/alerts in the console view
    pub activity_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_api(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    /// Build a config for the given API origin with default settings
    pub fn for_api(api_base_url: &str) -> Self {
        let api_base_url = api_base_url.trim_end_matches('/').to_string();
        Self {
            ws_base_url: ws_origin(&api_base_url),
            api_base_url,
            session_path: default_session_path(),
            http_timeout: Duration::from_secs(30),
            ws_connect_timeout: Duration::from_secs(10),
            feed_buffer: 256,
            activity_limit: 50,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ClientError> {
        let api_base_url =
            std::env::var("CLOUDSHIELD_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ClientError::Config(format!(
                "CLOUDSHIELD_API_URL must be an http(s) origin, got {}",
                api_base_url
            )));
        }

        let mut config = Self::for_api(&api_base_url);

        if let Ok(path) = std::env::var("CLOUDSHIELD_SESSION_FILE") {
            config.session_path = PathBuf::from(path);
        }

        config.http_timeout = std::env::var("CLOUDSHIELD_HTTP_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.http_timeout);

        config.ws_connect_timeout = std::env::var("CLOUDSHIELD_WS_CONNECT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.ws_connect_timeout);

        config.feed_buffer = std::env::var("CLOUDSHIELD_FEED_BUFFER")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(config.feed_buffer);

        config.activity_limit = std::env::var("CLOUDSHIELD_ACTIVITY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(config.activity_limit);

        Ok(config)
    }

    /// Full URL for an API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    /// Live monitoring feed endpoint (without credentials)
    pub fn feed_url(&self) -> String {
        format!("{}/monitoring/ws", self.ws_base_url)
    }
}

/// Derive the WebSocket origin from an HTTP origin
pub fn ws_origin(api_base_url: &str) -> String {
    if let Some(rest) = api_base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        api_base_url.to_string()
    }
}

fn default_session_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cloudshield")
        .join("session.json")
}
