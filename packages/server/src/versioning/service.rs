use chrono::Utc;
use sea_orm::{ConnectionTrait, TransactionSession, TransactionTrait};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::catalog::FileCatalog;
use super::error::VersionError;
use crate::entity::file_record;

/// Metadata of a blob that has already been written to the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBlob {
    pub uploader_id: i32,
    pub original_name: String,
    pub mime_type: Option<String>,
    pub byte_size: i64,
    pub storage_path: String,
}

/// Note recorded on a new version when the uploader gives none.
pub fn default_version_note(version_number: i32) -> String {
    format!("Version {version_number}")
}

/// Maintains version chains on top of the file catalog.
///
/// Stateless: every call re-reads the catalog.
pub struct VersionedFileStore<'a, C> {
    db: &'a C,
}

impl<'a, C> VersionedFileStore<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Start a new chain: version 1, latest, `root_id == id`.
    pub async fn create_initial_file(
        &self,
        project_id: i32,
        blob: UploadedBlob,
    ) -> Result<file_record::Model, VersionError> {
        let id = Uuid::now_v7();
        let record = new_record(id, project_id, blob, id, 1, None);

        let saved = FileCatalog::new(self.db)
            .insert(record)
            .await
            .map_err(|e| VersionError::from_write(e, id))?;

        info!(file_id = %saved.id, project_id, "Created new document chain");
        Ok(saved)
    }

    /// Append a revision to the chain containing `parent_id`.
    ///
    /// `parent_id` may be any member of the chain, not only its head. The new
    /// record gets `max(version_number) + 1` over the persisted chain and
    /// becomes the only latest record. Everything happens in one
    /// transaction holding a row lock on the chain's root.
    pub async fn create_new_version(
        &self,
        parent_id: Uuid,
        blob: UploadedBlob,
        note: Option<String>,
    ) -> Result<file_record::Model, VersionError> {
        let txn = self.db.begin().await.map_err(VersionError::StorageWrite)?;
        let catalog = FileCatalog::new(&txn);

        let parent = catalog
            .get_by_id(parent_id)
            .await?
            .ok_or(VersionError::ParentNotFound(parent_id))?;
        let root_id = parent.root_id;

        let root = catalog
            .get_for_update(root_id)
            .await?
            .ok_or(VersionError::NotFound(root_id))?;

        // Read after taking the lock so a writer that committed while we
        // waited is visible here.
        let chain = catalog.query_by_root(root_id).await?;
        let version_number = next_version_number(&chain);

        for head in chain.iter().filter(|r| r.is_latest) {
            catalog
                .update_is_latest(head.id, false)
                .await
                .map_err(|e| VersionError::from_write(e, root_id))?;
        }

        let note = note.unwrap_or_else(|| default_version_note(version_number));
        let record = new_record(
            Uuid::now_v7(),
            root.project_id,
            blob,
            root_id,
            version_number,
            Some(note),
        );
        let saved = catalog
            .insert(record)
            .await
            .map_err(|e| VersionError::from_write(e, root_id))?;

        txn.commit().await.map_err(|e| {
            let err = VersionError::from_write(e, root_id);
            if matches!(err, VersionError::Conflict(_)) {
                warn!(%root_id, "Concurrent version upload lost the race");
            }
            err
        })?;

        info!(
            file_id = %saved.id,
            %root_id,
            version_number,
            "Created new document version"
        );
        Ok(saved)
    }

    /// Full history of the chain containing `any_id`, newest first.
    ///
    /// An unknown id yields an empty list rather than an error.
    pub async fn list_versions(
        &self,
        any_id: Uuid,
    ) -> Result<Vec<file_record::Model>, VersionError> {
        let catalog = FileCatalog::new(self.db);
        let Some(record) = catalog.get_by_id(any_id).await? else {
            return Ok(Vec::new());
        };
        Ok(catalog.query_by_root(record.root_id).await?)
    }

    /// Current head of the chain containing `any_id`.
    pub async fn get_latest(&self, any_id: Uuid) -> Result<file_record::Model, VersionError> {
        let catalog = FileCatalog::new(self.db);
        let record = catalog
            .get_by_id(any_id)
            .await?
            .ok_or(VersionError::NotFound(any_id))?;

        let heads = catalog.query_latest_by_root(record.root_id).await?;
        single_head(record.root_id, heads)
    }

    /// Head of every chain in a project. Historical revisions are excluded.
    pub async fn list_project_files(
        &self,
        project_id: i32,
    ) -> Result<Vec<file_record::Model>, VersionError> {
        Ok(FileCatalog::new(self.db)
            .query_latest_by_project(project_id)
            .await?)
    }

    /// A single record, whichever version it is.
    pub async fn get_file(&self, id: Uuid) -> Result<file_record::Model, VersionError> {
        FileCatalog::new(self.db)
            .get_by_id(id)
            .await?
            .ok_or(VersionError::NotFound(id))
    }
}

fn new_record(
    id: Uuid,
    project_id: i32,
    blob: UploadedBlob,
    root_id: Uuid,
    version_number: i32,
    version_note: Option<String>,
) -> file_record::Model {
    file_record::Model {
        id,
        project_id,
        uploader_id: blob.uploader_id,
        original_name: blob.original_name,
        mime_type: blob.mime_type,
        byte_size: blob.byte_size,
        storage_path: blob.storage_path,
        root_id,
        version_number,
        is_latest: true,
        version_note,
        created_at: Utc::now(),
    }
}

/// Next version number for a chain, computed from every persisted member.
pub(crate) fn next_version_number(chain: &[file_record::Model]) -> i32 {
    chain
        .iter()
        .map(|r| r.version_number)
        .max()
        .unwrap_or(0)
        + 1
}

/// Exactly one head, or a logged invariant violation.
pub(crate) fn single_head(
    root_id: Uuid,
    mut heads: Vec<file_record::Model>,
) -> Result<file_record::Model, VersionError> {
    if heads.len() == 1
        && let Some(head) = heads.pop()
    {
        return Ok(head);
    }

    error!(
        %root_id,
        latest_count = heads.len(),
        "Version chain does not have exactly one latest record"
    );
    Err(VersionError::InvariantViolation {
        root_id,
        latest_count: heads.len(),
    })
}
