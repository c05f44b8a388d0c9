use sea_orm::{DbErr, SqlErr};
use uuid::Uuid;

/// Failures of version-chain operations.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// The file a new version was supposed to attach to does not exist.
    #[error("parent file {0} not found")]
    ParentNotFound(Uuid),

    #[error("file {0} not found")]
    NotFound(Uuid),

    /// Another writer modified the chain concurrently. Safe to retry.
    #[error("chain {0} was modified concurrently")]
    Conflict(Uuid),

    /// A chain does not have exactly one record flagged as latest.
    #[error("chain {root_id} has {latest_count} latest records, expected exactly 1")]
    InvariantViolation { root_id: Uuid, latest_count: usize },

    /// A catalog write (or the surrounding transaction) failed.
    #[error("catalog write failed: {0}")]
    StorageWrite(#[source] DbErr),

    #[error("catalog read failed: {0}")]
    Catalog(#[from] DbErr),
}

impl VersionError {
    /// Classify a failed write against the chain rooted at `root_id`.
    pub(crate) fn from_write(err: DbErr, root_id: Uuid) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::Conflict(root_id),
            _ => Self::StorageWrite(err),
        }
    }
}
