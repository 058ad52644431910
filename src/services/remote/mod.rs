use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub mod cloudinary;

pub use cloudinary::CloudinaryStore;

/// Classification the remote store assigns to a committed asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
    Raw,
}

impl ResourceKind {
    /// Maps the provider's `resource_type` string onto a kind.
    pub fn from_provider(value: &str) -> Option<Self> {
        match value {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }

    /// Content-sniffing fallback over the leading bytes. The provider files
    /// audio under video, so sniffed audio maps the same way.
    pub fn detect(head: &[u8]) -> Self {
        match infer::get(head).map(|t| t.matcher_type()) {
            Some(infer::MatcherType::Image) => Self::Image,
            Some(infer::MatcherType::Video) | Some(infer::MatcherType::Audio) => Self::Video,
            _ => Self::Raw,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Raw => "raw",
        };
        write!(f, "{}", s)
    }
}

/// Durable remote record of a committed upload. Produced only on success;
/// ownership transfers to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CommittedAsset {
    /// Canonical locator (URL) usable for later retrieval
    pub locator: String,
    pub kind: ResourceKind,
    /// Provider-side identifier, when the provider reports one
    pub remote_id: Option<String>,
    pub bytes: u64,
}

/// Per-upload options carried from the request into the commit call.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Remote folder to file the asset under
    pub folder: Option<String>,
}

#[derive(Error, Debug)]
pub enum RemoteStoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Opaque capability over the remote durable asset store. Uploads accept
/// any content; the kind is auto-detected rather than pre-declared by the
/// caller. Implementations must not retry internally.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        content_type: Option<&str>,
        options: &UploadOptions,
    ) -> Result<CommittedAsset, RemoteStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_mapping() {
        assert_eq!(ResourceKind::from_provider("image"), Some(ResourceKind::Image));
        assert_eq!(ResourceKind::from_provider("video"), Some(ResourceKind::Video));
        assert_eq!(ResourceKind::from_provider("raw"), Some(ResourceKind::Raw));
        assert_eq!(ResourceKind::from_provider("hologram"), None);
    }

    #[test]
    fn test_kind_detection_from_magic_bytes() {
        // JPEG SOI marker
        assert_eq!(ResourceKind::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), ResourceKind::Image);
        // PNG signature
        assert_eq!(
            ResourceKind::detect(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ResourceKind::Image
        );
        // Unrecognized bytes fall through to raw
        assert_eq!(ResourceKind::detect(b"%PDF-like but not really"), ResourceKind::Raw);
        assert_eq!(ResourceKind::detect(&[]), ResourceKind::Raw);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ResourceKind::Image).unwrap(), "\"image\"");
        assert_eq!(ResourceKind::Video.to_string(), "video");
    }
}
