use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One stored revision of a logical document.
///
/// Revisions of the same document form a chain sharing `root_id`, the id of
/// the chain's first revision. Rows are immutable apart from `is_latest`,
/// which flips to `false` when a newer revision supersedes the row.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_record")]
pub struct Model {
    /// UUIDv7 primary key, assigned before insert.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub project_id: i32,
    pub uploader_id: i32,

    /// Validated upload filename.
    pub original_name: String,
    pub mime_type: Option<String>,
    pub byte_size: i64,

    /// Blob store path (`ab/cdef...`).
    pub storage_path: String,

    /// Id of the version-1 record of this chain (equal to `id` for version 1).
    pub root_id: Uuid,
    /// 1-based, gapless within a chain.
    pub version_number: i32,
    pub is_latest: bool,
    pub version_note: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
