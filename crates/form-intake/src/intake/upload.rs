use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;

use super::normalizer::mint_id;
use super::sinks::file_store::write_atomic;
use super::sinks::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid upload name '{0}'")]
    InvalidName(String),
    #[error("an upload named '{0}' already exists")]
    Exists(String),
    #[error("failed to store upload at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Opaque blob passthrough: bytes land as-is in a flat directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `bytes` under `name`, or under a generated name when none is given.
    /// An existing file is never replaced.
    pub async fn store(&self, name: Option<&str>, bytes: &[u8]) -> Result<String, UploadError> {
        let name = match name {
            Some(raw) => sanitize(raw)?,
            None => format!("{}.bin", mint_id("UPLOAD", Utc::now())),
        };

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| UploadError::Io {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.dir.join(&name);
        let exists = fs::try_exists(&path)
            .await
            .map_err(|source| UploadError::Io {
                path: path.clone(),
                source,
            })?;
        if exists {
            return Err(UploadError::Exists(name));
        }

        write_atomic(&path, bytes).await?;
        Ok(name)
    }
}

fn sanitize(raw: &str) -> Result<String, UploadError> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 200
        && !trimmed.starts_with('.')
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(UploadError::InvalidName(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_traversal_and_hidden_names() {
        assert_eq!(sanitize(" cv-2025.pdf ").expect("valid"), "cv-2025.pdf");
        assert!(sanitize("../secrets").is_err());
        assert!(sanitize(".env").is_err());
        assert!(sanitize("dir/file.txt").is_err());
        assert!(sanitize("").is_err());
    }

    #[tokio::test]
    async fn store_generates_names_when_missing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = UploadStore::new(tmp.path().join("uploads"), 1024);

        let name = store.store(None, b"hello").await.expect("stored");
        assert!(name.starts_with("UPLOAD_"));
        let written = std::fs::read(store.dir().join(&name)).expect("file exists");
        assert_eq!(written, b"hello");
    }

    #[tokio::test]
    async fn store_never_overwrites_and_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = UploadStore::new(tmp.path().join("uploads"), 1024);

        store
            .store(Some("cv.pdf"), b"first")
            .await
            .expect("first upload stored");
        match store.store(Some("cv.pdf"), b"second").await {
            Err(UploadError::Exists(name)) => assert_eq!(name, "cv.pdf"),
            other => panic!("expected existing-name rejection, got {other:?}"),
        }

        let written = std::fs::read(store.dir().join("cv.pdf")).expect("file exists");
        assert_eq!(written, b"first");
        let names: Vec<String> = std::fs::read_dir(store.dir())
            .expect("dir listing")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cv.pdf".to_string()]);
    }
}
