use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::StorageError;

/// Location of a blob inside a content-addressed store.
///
/// Derived from the SHA-256 digest of the blob and rendered Git-style as
/// `{2 hex chars}/{62 hex chars}`. Only valid digests can be represented,
/// so a parsed path never points outside the store's base directory.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoragePath([u8; 32]);

impl StoragePath {
    /// Path of the blob holding exactly `data`.
    pub fn for_content(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Parse a rendered `ab/cdef...` path.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let (prefix, suffix) = s
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidPath(format!("missing shard separator: {s}")))?;
        if prefix.len() != 2 || suffix.len() != 62 {
            return Err(StorageError::InvalidPath(format!(
                "expected 2/62 hex characters, got {}/{}",
                prefix.len(),
                suffix.len()
            )));
        }

        let mut hex_digest = String::with_capacity(64);
        hex_digest.push_str(prefix);
        hex_digest.push_str(suffix);
        let bytes = hex::decode(&hex_digest)
            .map_err(|e| StorageError::InvalidPath(format!("invalid hex: {e}")))?;

        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StorageError::InvalidPath("decoded to wrong length".into()))?;
        Ok(Self(digest))
    }

    /// The full 64-character lowercase hex digest.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Relative filesystem path (`ab` directory, 62-char file name).
    pub fn relative(&self) -> PathBuf {
        PathBuf::from(hex::encode(&self.0[..1])).join(hex::encode(&self.0[1..]))
    }
}

impl fmt::Debug for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoragePath({self})")
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", hex::encode(&self.0[..1]), hex::encode(&self.0[1..]))
    }
}

impl Serialize for StoragePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StoragePath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
