use super::{CommittedAsset, RemoteStore, RemoteStoreError, ResourceKind, UploadOptions};
use crate::config::CloudConfig;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Commit client for the hosted media store. Uploads go to the account's
/// `auto` endpoint, so images, video and raw binary are all accepted and
/// classified server-side.
pub struct CloudinaryStore {
    client: reqwest::Client,
    config: CloudConfig,
}

#[derive(Deserialize)]
struct UploadApiResponse {
    public_id: Option<String>,
    resource_type: Option<String>,
    bytes: Option<u64>,
    secure_url: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct UploadApiError {
    error: UploadApiErrorBody,
}

#[derive(Deserialize)]
struct UploadApiErrorBody {
    message: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/auto/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Request signature: signed parameters sorted by name, joined as
    /// `k=v` pairs with `&`, secret appended, SHA-256 hex digest.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl RemoteStore for CloudinaryStore {
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        content_type: Option<&str>,
        options: &UploadOptions,
    ) -> Result<CommittedAsset, RemoteStoreError> {
        let size = data.len() as u64;
        let sniff = data.slice(0..data.len().min(512));
        let timestamp = Utc::now().timestamp().to_string();

        let mut signed: Vec<(&str, &str)> = vec![("timestamp", &timestamp)];
        if let Some(folder) = options.folder.as_deref() {
            signed.push(("folder", folder));
        }
        let signature = self.sign(&signed);

        let part = Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str(content_type.unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref()))?;

        let mut form = Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.clone())
            .text("signature", signature)
            .part("file", part);
        if let Some(folder) = &options.folder {
            form = form.text("folder", folder.clone());
        }

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<UploadApiError>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "no error detail".to_string());
            return Err(RemoteStoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadApiResponse = response.json().await?;
        let locator = body
            .secure_url
            .or(body.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                RemoteStoreError::MalformedResponse("upload response carried no URL".to_string())
            })?;
        let kind = body
            .resource_type
            .as_deref()
            .and_then(ResourceKind::from_provider)
            .unwrap_or_else(|| ResourceKind::detect(&sniff));

        Ok(CommittedAsset {
            locator,
            kind,
            remote_id: body.public_id,
            bytes: body.bytes.unwrap_or(size),
        })
    }
}
