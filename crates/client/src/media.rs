//! Image hosting gateway.
//!
//! The contract is deliberately narrow: given a local file, produce a
//! publicly hosted URL. Uploads go to the configured Cloudinary
//! account with an unsigned upload preset; no bearer token is
//! involved.

use std::path::Path;

use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use swwap_shared::ClientError;

use crate::config::ClientConfig;

pub struct MediaGateway {
    client: reqwest::Client,
    cloud_name: Option<String>,
    upload_preset: Option<String>,
    /// Overridable for tests; defaults to the Cloudinary API.
    upload_base: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl MediaGateway {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cloud_name: config.cloudinary_cloud_name.clone(),
            upload_preset: config.cloudinary_upload_preset.clone(),
            upload_base: "https://api.cloudinary.com/v1_1".to_string(),
        }
    }

    #[cfg(test)]
    fn with_upload_base(mut self, base: &str) -> Self {
        self.upload_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Upload a local image file and return its hosted URL.
    pub async fn upload(&self, path: &Path) -> Result<String, ClientError> {
        let (Some(cloud_name), Some(preset)) = (&self.cloud_name, &self.upload_preset) else {
            return Err(ClientError::Remote {
                status: 500,
                message: "image hosting is not configured".to_string(),
            });
        };

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Storage(format!("cannot read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        debug!("uploading {} ({} bytes)", file_name, bytes.len());

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name))
            .text("upload_preset", preset.clone());

        let url = format!("{}/{cloud_name}/image/upload", self.upload_base);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                debug!("upload transport failure: {e}");
                ClientError::unreachable()
            })?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp.text().await.map_err(|_| ClientError::unreachable())?;

        if !is_success {
            return Err(ClientError::Remote {
                status,
                message: "failed to upload image".to_string(),
            });
        }

        let parsed: UploadResponse =
            serde_json::from_str(&text).map_err(|e| ClientError::Deserialize(e.to_string()))?;
        Ok(parsed.secure_url)
    }
}
