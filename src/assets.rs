//! Uploaded image assets.
//!
//! Images live as flat files under the uploads directory and are served back
//! at `/uploads/<file>`. Records store the relative reference
//! (`uploads/imageFile-....jpg`), never an absolute path, so the store stays
//! portable across hosts.
//!
//! Asset writes are not transactional with record writes. Callers follow a
//! compensating-delete rule: any failure after a file was written deletes
//! that file before the error propagates. A crash between the file write and
//! the record write can still orphan a file.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::Utc;
use rand::Rng;
use tokio::fs;
use tracing::info;

use crate::error::AppError;

pub const UPLOADS_PREFIX: &str = "uploads";

#[derive(Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub async fn open(root: &str) -> Result<Self, AppError> {
        fs::create_dir_all(root).await?;

        Ok(Self { root: root.into() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the bytes under a fresh unique name and returns the relative
    /// reference to record, e.g. `uploads/imageFile-1730185234567-381954.jpg`.
    pub async fn save(
        &self,
        field_name: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        let extension = Path::new(original_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let unique_suffix = format!(
            "{}-{:06}",
            Utc::now().timestamp_millis(),
            rand::thread_rng().gen_range(0..1_000_000)
        );
        let file_name = format!("{field_name}-{unique_suffix}{extension}");

        fs::write(self.root.join(&file_name), bytes).await?;

        Ok(format!("{UPLOADS_PREFIX}/{file_name}"))
    }

    /// Removes the file behind a stored relative reference. Missing files are
    /// fine, the reference may already have been cleaned up.
    pub async fn delete(&self, reference: &str) -> Result<(), AppError> {
        let file_name = reference.rsplit('/').next().unwrap_or(reference);

        match fs::remove_file(self.root.join(file_name)).await {
            Ok(()) => {
                info!("Deleted image file: {reference}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, reference: &str) -> bool {
        let file_name = reference.rsplit('/').next().unwrap_or(reference);

        fs::try_exists(self.root.join(file_name)).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (AssetStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path().to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn save_returns_relative_reference_and_keeps_extension() {
        let (store, _dir) = temp_store().await;

        let reference = store.save("imageFile", "burger.jpg", b"fake").await.unwrap();

        assert!(reference.starts_with("uploads/imageFile-"));
        assert!(reference.ends_with(".jpg"));
        assert!(store.exists(&reference).await);
    }

    #[tokio::test]
    async fn delete_removes_file_and_tolerates_absence() {
        let (store, _dir) = temp_store().await;
        let reference = store.save("imageFile", "pic.png", b"fake").await.unwrap();

        store.delete(&reference).await.unwrap();
        assert!(!store.exists(&reference).await);

        // Second delete is a no-op, not an error.
        store.delete(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn two_saves_never_collide() {
        let (store, _dir) = temp_store().await;

        let a = store.save("imageFile", "a.jpg", b"a").await.unwrap();
        let b = store.save("imageFile", "a.jpg", b"b").await.unwrap();

        assert_ne!(a, b);
    }
}
