//! HTTP client wrapper for the swwap backend.
//!
//! Builds URLs, attaches the bearer credential when one is supplied,
//! and normalizes every failure into the shared error taxonomy:
//! transport failures become `Remote { 500, "service unreachable" }`,
//! non-success statuses carry the server's `{"message"}` when present.
//! The client never retries; retry policy belongs to the query layer.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;

use swwap_shared::{try_error_message, ClientError};

use crate::config::ClientConfig;

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client from configuration. The request timeout is
    /// explicit rather than inherited from transport defaults.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Remote {
                status: 500,
                message: format!("cannot initialize http client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: normalize_base_url(&config.api_url),
        })
    }

    /// Resolve a path against the base URL. Absolute URLs pass through.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub async fn get_json<TRes: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<TRes, ClientError> {
        let rb = self.client.get(self.url(path));
        self.execute(with_bearer(rb, token)).await
    }

    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
        token: Option<&str>,
    ) -> Result<TRes, ClientError> {
        let rb = self.client.post(self.url(path)).json(body);
        self.execute(with_bearer(rb, token)).await
    }

    /// POST without a body (the logout endpoint takes none).
    pub async fn post_empty<TRes: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<TRes, ClientError> {
        let rb = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json");
        self.execute(with_bearer(rb, token)).await
    }

    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
        token: Option<&str>,
    ) -> Result<TRes, ClientError> {
        let rb = self.client.put(self.url(path)).json(body);
        self.execute(with_bearer(rb, token)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<(), ClientError> {
        let rb = self.client.delete(self.url(path));
        let _: serde_json::Value = self.execute(with_bearer(rb, token)).await?;
        Ok(())
    }

    async fn execute<TRes: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
    ) -> Result<TRes, ClientError> {
        let resp = rb.send().await.map_err(|e| {
            tracing::debug!("transport failure: {e}");
            ClientError::unreachable()
        })?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp.text().await.map_err(|e| {
            tracing::debug!("failed to read response body: {e}");
            ClientError::unreachable()
        })?;

        if !is_success {
            let message = try_error_message(&text).unwrap_or_default();
            tracing::debug!("request rejected: HTTP {status} {message}");
            return Err(ClientError::Remote { status, message });
        }

        if text.is_empty() {
            serde_json::from_str("null").map_err(|e| ClientError::Deserialize(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| ClientError::Deserialize(e.to_string()))
        }
    }
}

fn with_bearer(rb: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => rb.bearer_auth(token),
        None => rb,
    }
}

/// Infer a scheme for bare hosts: localhost and LAN addresses get
/// `http`, everything else `https`. Full URLs pass through unchanged.
pub fn normalize_base_url(raw: &str) -> String {
    let domain = raw.trim();
    if domain.contains("://") {
        return domain.trim_end_matches('/').to_string();
    }

    let host_part = domain.split(':').next().unwrap_or(domain);
    let is_local = host_part == "localhost"
        || host_part == "127.0.0.1"
        || host_part == "0.0.0.0"
        || host_part.starts_with("192.168.")
        || host_part.starts_with("10.");

    if is_local {
        format!("http://{}", domain.trim_end_matches('/'))
    } else {
        format!("https://{}", domain.trim_end_matches('/'))
    }
}
