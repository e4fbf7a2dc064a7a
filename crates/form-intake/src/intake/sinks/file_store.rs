use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::intake::domain::{Record, SubmissionKind};

pub const PROCESSED_DIR: &str = "processed";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to encode record {id}: {source}")]
    Encode {
        id: String,
        source: serde_json::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Local durable store: one pretty-printed JSON file per record under a per-kind directory.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every kind directory plus the processed partition. Run once at startup.
    pub async fn ensure_layout(&self) -> Result<(), StoreError> {
        for kind in SubmissionKind::ALL {
            let dir = self.kind_dir(kind);
            fs::create_dir_all(&dir)
                .await
                .map_err(|err| StoreError::io(&dir, err))?;
            if kind.tracks_lifecycle() {
                let processed = self.processed_dir(kind);
                fs::create_dir_all(&processed)
                    .await
                    .map_err(|err| StoreError::io(&processed, err))?;
            }
        }
        Ok(())
    }

    pub fn kind_dir(&self, kind: SubmissionKind) -> PathBuf {
        self.root.join(kind.directory())
    }

    pub fn processed_dir(&self, kind: SubmissionKind) -> PathBuf {
        self.kind_dir(kind).join(PROCESSED_DIR)
    }

    pub fn pending_path(&self, kind: SubmissionKind, id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{id}.json"))
    }

    pub fn processed_path(&self, kind: SubmissionKind, id: &str) -> PathBuf {
        self.processed_dir(kind).join(format!("{id}.json"))
    }

    /// Write a freshly normalized record into its kind directory.
    pub async fn put(&self, record: &Record) -> Result<PathBuf, StoreError> {
        let path = self.pending_path(record.kind, record.id.as_str());
        self.write_record(&path, record).await?;
        debug!(record_id = %record.id, path = %path.display(), "record written to local store");
        Ok(path)
    }

    /// True when the id is already taken in either partition.
    pub async fn contains(&self, kind: SubmissionKind, id: &str) -> Result<bool, StoreError> {
        if self.exists(&self.pending_path(kind, id)).await? {
            return Ok(true);
        }
        if kind.tracks_lifecycle() {
            return self.exists(&self.processed_path(kind, id)).await;
        }
        Ok(false)
    }

    pub async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        fs::try_exists(path)
            .await
            .map_err(|err| StoreError::io(path, err))
    }

    /// Serialize and write atomically: temp file, fsync, rename, then fsync the directory.
    pub async fn write_record(&self, path: &Path, record: &Record) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Encode {
            id: record.id.to_string(),
            source,
        })?;
        write_atomic(path, &bytes).await
    }

    pub async fn read(&self, path: &Path) -> Result<Record, StoreError> {
        let bytes = fs::read(path)
            .await
            .map_err(|err| StoreError::io(path, err))?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`read`](Self::read) but a missing file is `None` rather than an error.
    pub async fn read_optional(&self, path: &Path) -> Result<Option<Record>, StoreError> {
        match self.read(path).await {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Delete a record file. Returns `false` when it was already gone.
    pub async fn remove(&self, path: &Path) -> Result<bool, StoreError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }

    /// Parse every `*.json` file directly inside `dir`. Sub-directories are not descended
    /// into, and a file that fails to read or parse is logged and skipped.
    pub async fn scan(&self, dir: &Path) -> Result<Vec<Record>, StoreError> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(dir, err)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StoreError::io(dir, err))?
        {
            let path = entry.path();
            let is_file = match entry.file_type().await {
                Ok(file_type) => file_type.is_file(),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !is_file || path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match self.read(&path).await {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping corrupt record"),
            }
        }

        Ok(records)
    }
}

/// Temp file, fsync, rename over `path`, then fsync the parent directory.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::io(path, io::Error::other("record path has no parent")))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| StoreError::io(path, io::Error::other("record path has no file name")))?;

    let nonce: u32 = rand::thread_rng().gen();
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(format!(".{nonce:08x}.tmp"));
    let tmp_path = parent.join(tmp_name);

    let result = async {
        let mut file = File::create(&tmp_path)
            .await
            .map_err(|err| StoreError::io(&tmp_path, err))?;
        file.write_all(bytes)
            .await
            .map_err(|err| StoreError::io(&tmp_path, err))?;
        file.sync_all()
            .await
            .map_err(|err| StoreError::io(&tmp_path, err))?;
        drop(file);
        fs::rename(&tmp_path, path)
            .await
            .map_err(|err| StoreError::io(path, err))
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
        return result;
    }

    // Persist the rename itself. Not every platform lets a directory be opened for sync.
    if let Ok(dir) = File::open(parent).await {
        if let Err(err) = dir.sync_all().await {
            debug!(dir = %parent.display(), error = %err, "directory fsync unsupported");
        }
    }

    Ok(())
}
