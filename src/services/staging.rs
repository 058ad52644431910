use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Local, ephemeral holding area for an inbound file before it is durably
/// committed. The directory is a shared namespace; name uniqueness per file
/// is the only discipline concurrent requests need.
pub struct StagingStore {
    root: PathBuf,
}

/// Transient copy of one inbound file. Owned exclusively by the pipeline
/// instance handling one request and destroyed by `StagingStore::release`
/// before that pipeline returns. If the owning future is dropped first
/// (client disconnect), the drop guard removes the file best-effort.
pub struct StagedFile {
    path: PathBuf,
    pub original_name: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    armed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::warn!(
                "Staged file {} removed by drop guard (pipeline abandoned mid-flight)",
                self.path.display()
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove abandoned staged file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl StagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Streams the inbound bytes to a uniquely named file under the staging
    /// root and returns its descriptor. The name combines the ingestion
    /// timestamp, a short random discriminator and the original filename, so
    /// identically named concurrent uploads cannot collide.
    pub async fn stage(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        mut reader: impl AsyncRead + Unpin + Send,
    ) -> std::io::Result<StagedFile> {
        let created_at = Utc::now();
        let discriminator = Uuid::new_v4().simple().to_string();
        let staged_name = format!(
            "{}-{}-{}",
            created_at.timestamp_millis(),
            &discriminator[..8],
            original_name
        );

        let mut staged = StagedFile {
            path: self.root.join(staged_name),
            original_name: original_name.to_string(),
            content_type: content_type.map(|s| s.to_string()),
            size: 0,
            created_at,
            armed: true,
        };

        // A partial write leaves the descriptor armed, so the guard cleans
        // up whatever made it to disk.
        let mut file = fs::File::create(&staged.path).await?;
        let mut buffer = [0u8; 8192];
        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n]).await?;
            staged.size += n as u64;
        }
        file.flush().await?;

        tracing::debug!(
            "Staged {} ({} bytes) at {}",
            staged.original_name,
            staged.size,
            staged.path.display()
        );

        Ok(staged)
    }

    /// Deletes the staged copy. Finding the file already gone is logged as
    /// an anomaly but treated as success; cleanup may race with manual
    /// intervention on the staging directory.
    pub async fn release(&self, mut staged: StagedFile) -> std::io::Result<()> {
        staged.armed = false;
        match fs::remove_file(&staged.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    "Staged file {} was already gone at release",
                    staged.path.display()
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_stage_writes_bytes_and_records_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let staged = store
            .stage("scan.jpg", Some("image/jpeg"), std::io::Cursor::new(b"hello staging".to_vec()))
            .await
            .unwrap();

        assert_eq!(staged.size, 13);
        assert_eq!(staged.original_name, "scan.jpg");
        let on_disk = std::fs::read(staged.path()).unwrap();
        assert_eq!(on_disk, b"hello staging");

        store.release(staged).await.unwrap();
    }

    #[tokio::test]
    async fn test_identical_names_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let a = store
            .stage("photo.png", None, std::io::Cursor::new(b"a".to_vec()))
            .await
            .unwrap();
        let b = store
            .stage("photo.png", None, std::io::Cursor::new(b"b".to_vec()))
            .await
            .unwrap();

        assert_ne!(a.path(), b.path());
        assert_eq!(staged_count(dir.path()), 2);

        store.release(a).await.unwrap();
        store.release(b).await.unwrap();
        assert_eq!(staged_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_release_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let staged = store
            .stage("note.txt", None, std::io::Cursor::new(b"x".to_vec()))
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        store.release(staged).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_tolerates_already_removed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let staged = store
            .stage("note.txt", None, std::io::Cursor::new(b"x".to_vec()))
            .await
            .unwrap();
        std::fs::remove_file(staged.path()).unwrap();

        assert!(store.release(staged).await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_guard_removes_abandoned_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let staged = store
            .stage("orphan.bin", None, std::io::Cursor::new(b"x".to_vec()))
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }
}
