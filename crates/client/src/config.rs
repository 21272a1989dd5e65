//! Client configuration from environment variables.

use std::time::Duration;

/// Runtime configuration for the client core.
///
/// Environment variables:
/// - `SWWAP_API_URL`: API base URL (default: "http://localhost:3001/api")
/// - `SWWAP_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
/// - `SWWAP_QUERY_TTL_SECS`: cache time-to-live (default: 300)
/// - `SWWAP_QUERY_RETRIES`: read retries after a failed fetch (default: 2)
/// - `SWWAP_CLOUDINARY_CLOUD_NAME` / `SWWAP_CLOUDINARY_UPLOAD_PRESET`:
///   image hosting credentials; uploads are disabled when unset
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub query_ttl: Duration,
    pub query_retries: u32,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_upload_preset: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001/api".to_string(),
            request_timeout: Duration::from_secs(30),
            query_ttl: Duration::from_secs(300),
            query_retries: 2,
            cloudinary_cloud_name: None,
            cloudinary_upload_preset: None,
        }
    }
}

impl ClientConfig {
    /// Parse configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("SWWAP_API_URL").unwrap_or(defaults.api_url),
            request_timeout: secs_env("SWWAP_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            query_ttl: secs_env("SWWAP_QUERY_TTL_SECS", defaults.query_ttl),
            query_retries: std::env::var("SWWAP_QUERY_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.query_retries),
            cloudinary_cloud_name: non_empty_env("SWWAP_CLOUDINARY_CLOUD_NAME"),
            cloudinary_upload_preset: non_empty_env("SWWAP_CLOUDINARY_UPLOAD_PRESET"),
        }
    }
}

fn secs_env(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_secs)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
