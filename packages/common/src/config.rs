use std::path::PathBuf;

use serde::Deserialize;

/// Blob storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the filesystem blob store. Default: "./data/blobs".
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,
    /// Largest accepted upload in bytes. Default: 128 MiB.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("./data/blobs")
}
fn default_max_blob_size() -> u64 {
    128 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_dir: default_blob_dir(),
            max_blob_size: default_max_blob_size(),
        }
    }
}
