use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::services::remote::{CommittedAsset, RemoteStore, UploadOptions};
use crate::services::staging::{StagedFile, StagingStore};
use crate::utils::validation::sanitize_filename;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Orchestrates the ingestion pipeline for one inbound file: stage the
/// bytes locally, commit them to the remote store, and release the staged
/// copy on every exit path.
pub struct IngestService {
    staging: StagingStore,
    remote: Arc<dyn RemoteStore>,
    config: AppConfig,
}

impl IngestService {
    pub fn new(staging: StagingStore, remote: Arc<dyn RemoteStore>, config: AppConfig) -> Self {
        Self {
            staging,
            remote,
            config,
        }
    }

    /// Writes the inbound stream into the staging store under a sanitized,
    /// collision-resistant name. The size cap is checked after staging,
    /// since the body streams; an oversized staged copy is released before
    /// the rejection is returned.
    pub async fn stage_upload(
        &self,
        filename: &str,
        content_type: Option<&str>,
        reader: impl AsyncRead + Unpin + Send,
    ) -> Result<StagedFile, AppError> {
        let filename = sanitize_filename(filename).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let limit = self.config.max_file_size as u64;
        let staged = self
            .staging
            .stage(&filename, content_type, reader.take(limit + 1))
            .await?;

        if staged.size > limit {
            if let Err(e) = self.staging.release(staged).await {
                tracing::warn!("Failed to release oversized staged file: {}", e);
            }
            return Err(AppError::PayloadTooLarge(
                "File size limit exceeded".to_string(),
            ));
        }

        Ok(staged)
    }

    /// Commits a staged file to the remote store. The staged copy is
    /// released exactly once on every path out of here: after a successful
    /// commit, after a failed commit (the remote failure stays the reported
    /// cause), and after a local read failure. A release failure following
    /// a successful commit is logged but does not fail the request.
    pub async fn commit_upload(
        &self,
        staged: StagedFile,
        options: UploadOptions,
    ) -> Result<CommittedAsset, AppError> {
        let staged_path = staged.path().display().to_string();

        let data = match tokio::fs::read(staged.path()).await {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                if let Err(re) = self.staging.release(staged).await {
                    tracing::warn!("Staged copy {} not removed after read failure: {}", staged_path, re);
                }
                return Err(AppError::Io(e));
            }
        };

        let commit = self
            .remote
            .upload(
                data,
                &staged.original_name,
                staged.content_type.as_deref(),
                &options,
            )
            .await;

        let release = self.staging.release(staged).await;

        match commit {
            Ok(asset) => {
                if let Err(e) = release {
                    tracing::warn!(
                        "Staged copy {} not removed after successful commit: {}",
                        staged_path,
                        e
                    );
                }
                tracing::info!("File committed to remote storage: {}", asset.locator);
                Ok(asset)
            }
            Err(err) => {
                if let Err(e) = release {
                    tracing::warn!(
                        "Staged copy {} not removed after failed commit: {}",
                        staged_path,
                        e
                    );
                }
                Err(AppError::RemoteCommit(err))
            }
        }
    }

    /// Full pipeline for callers with the whole stream in hand.
    pub async fn ingest(
        &self,
        filename: &str,
        content_type: Option<&str>,
        reader: impl AsyncRead + Unpin + Send,
        options: UploadOptions,
    ) -> Result<CommittedAsset, AppError> {
        let staged = self.stage_upload(filename, content_type, reader).await?;
        self.commit_upload(staged, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::{RemoteStoreError, ResourceKind};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRemote {
        fail: bool,
        uploads: AtomicUsize,
    }

    impl StubRemote {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                uploads: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                uploads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RemoteStore for StubRemote {
        async fn upload(
            &self,
            data: Bytes,
            filename: &str,
            _content_type: Option<&str>,
            _options: &UploadOptions,
        ) -> Result<CommittedAsset, RemoteStoreError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RemoteStoreError::Rejected {
                    status: 503,
                    message: "simulated outage".to_string(),
                });
            }
            Ok(CommittedAsset {
                locator: format!("https://cdn.example.test/assets/{}", filename),
                kind: ResourceKind::detect(&data[..data.len().min(512)]),
                remote_id: Some(filename.to_string()),
                bytes: data.len() as u64,
            })
        }
    }

    fn service(dir: &Path, remote: Arc<dyn RemoteStore>, max_file_size: usize) -> IngestService {
        let mut config = AppConfig::development();
        config.staging_dir = dir.to_path_buf();
        config.max_file_size = max_file_size;
        IngestService::new(StagingStore::new(dir), remote, config)
    }

    fn staged_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_successful_ingest_releases_staged_copy() {
        let dir = tempfile::tempdir().unwrap();
        let remote = StubRemote::ok();
        let service = service(dir.path(), remote.clone(), 1024 * 1024);

        let asset = service
            .ingest(
                "scan.jpg",
                Some("image/jpeg"),
                std::io::Cursor::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]),
                UploadOptions::default(),
            )
            .await
            .unwrap();

        assert!(!asset.locator.is_empty());
        assert_eq!(asset.kind, ResourceKind::Image);
        assert_eq!(remote.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(staged_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_releases_staged_copy_and_keeps_cause() {
        let dir = tempfile::tempdir().unwrap();
        let remote = StubRemote::failing();
        let service = service(dir.path(), remote.clone(), 1024 * 1024);

        let err = service
            .ingest(
                "scan.jpg",
                None,
                std::io::Cursor::new(b"payload".to_vec()),
                UploadOptions::default(),
            )
            .await
            .unwrap_err();

        match err {
            AppError::RemoteCommit(RemoteStoreError::Rejected { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "simulated outage");
            }
            other => panic!("expected remote commit error, got {:?}", other),
        }
        assert_eq!(remote.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(staged_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let remote = StubRemote::ok();
        let service = service(dir.path(), remote.clone(), 16);

        let err = service
            .ingest(
                "big.bin",
                None,
                std::io::Cursor::new(vec![0u8; 64]),
                UploadOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        // Rejected before the remote store is ever consulted
        assert_eq!(remote.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(staged_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_bad_filename_rejected_before_staging() {
        let dir = tempfile::tempdir().unwrap();
        let remote = StubRemote::ok();
        let service = service(dir.path(), remote.clone(), 1024);

        let err = service
            .ingest(
                "",
                None,
                std::io::Cursor::new(b"x".to_vec()),
                UploadOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(remote.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(staged_count(dir.path()), 0);
    }
}
