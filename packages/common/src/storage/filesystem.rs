use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use super::error::StorageError;
use super::path::StoragePath;
use super::traits::{BlobStore, BoxReader, StoredBlob};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Content-addressed blob store on the local filesystem.
///
/// Layout: `{base_dir}/{2 hex chars}/{62 hex chars}` with in-flight writes
/// staged under `{base_dir}/.staging` and renamed into place once complete,
/// so readers never observe a partially written blob.
pub struct FilesystemBlobStore {
    base_dir: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Open (and create if needed) a store rooted at `base_dir`.
    pub async fn open(base_dir: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(base_dir.join(".staging")).await?;
        Ok(Self { base_dir, max_size })
    }

    fn full_path(&self, path: &StoragePath) -> PathBuf {
        self.base_dir.join(path.relative())
    }

    fn staging_path(&self) -> PathBuf {
        self.base_dir
            .join(".staging")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Copy `reader` into `staging`, hashing as we go.
    async fn stage(
        &self,
        mut reader: BoxReader,
        staging: &Path,
    ) -> Result<StoredBlob, StorageError> {
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut file = fs::File::create(staging).await?;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            size += n as u64;
            if size > self.max_size {
                return Err(StorageError::SizeLimitExceeded {
                    actual: size,
                    limit: self.max_size,
                });
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
        }
        file.flush().await?;

        Ok(StoredBlob {
            path: StoragePath::from_digest(hasher.finalize().into()),
            size,
        })
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn write_stream(&self, reader: BoxReader) -> Result<StoredBlob, StorageError> {
        let staging = self.staging_path();

        let stored = match self.stage(reader, &staging).await {
            Ok(stored) => stored,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        if self.exists(&stored.path).await? {
            debug!(path = %stored.path, "Blob already stored, discarding duplicate");
            let _ = fs::remove_file(&staging).await;
            return Ok(stored);
        }

        let target = self.full_path(&stored.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        Ok(stored)
    }

    async fn read_stream(&self, path: &StoragePath) -> Result<BoxReader, StorageError> {
        match fs::File::open(self.full_path(path)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.full_path(path)).await?)
    }
}
