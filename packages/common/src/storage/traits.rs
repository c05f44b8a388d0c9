use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::path::StoragePath;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: StoragePath,
    /// Number of bytes written.
    pub size: u64,
}

/// Durable storage for uploaded file bytes.
///
/// Writes return the path under which the bytes can be read back. Blobs are
/// never removed through this interface.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes held in memory.
    async fn write(&self, data: &[u8]) -> Result<StoredBlob, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.write_stream(reader).await
    }

    /// Store everything produced by `reader`.
    async fn write_stream(&self, reader: BoxReader) -> Result<StoredBlob, StorageError>;

    /// Read a whole blob into memory.
    async fn read(&self, path: &StoragePath) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.read_stream(path).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Open a blob for streaming.
    async fn read_stream(&self, path: &StoragePath) -> Result<BoxReader, StorageError>;

    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError>;
}
