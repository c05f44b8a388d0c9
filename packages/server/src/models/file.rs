use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::file_record;
use crate::error::AppError;

/// Longest accepted version note, in characters.
pub const MAX_VERSION_NOTE_LEN: usize = 1024;

/// Response DTO for a single stored revision.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    /// Record ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000002")]
    pub id: String,
    #[schema(example = 7)]
    pub project_id: i32,
    #[schema(example = 3)]
    pub uploader_id: i32,
    /// Original upload filename.
    #[schema(example = "spec.pdf")]
    pub original_name: String,
    #[schema(example = "application/pdf")]
    pub mime_type: Option<String>,
    /// Blob size in bytes.
    #[schema(example = 142857)]
    pub byte_size: i64,
    /// ID of the document's first version.
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub root_id: String,
    #[schema(example = 2)]
    pub version_number: i32,
    /// Whether this is the document's current version.
    pub is_latest: bool,
    #[schema(example = "fixed typo")]
    pub version_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<file_record::Model> for FileResponse {
    fn from(model: file_record::Model) -> Self {
        Self {
            id: model.id.to_string(),
            project_id: model.project_id,
            uploader_id: model.uploader_id,
            original_name: model.original_name,
            mime_type: model.mime_type,
            byte_size: model.byte_size,
            root_id: model.root_id.to_string(),
            version_number: model.version_number,
            is_latest: model.is_latest,
            version_note: model.version_note,
            created_at: model.created_at,
        }
    }
}

/// Current version of every document in a project.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    pub total: u64,
}

/// Full history of one document, newest version first.
#[derive(Serialize, utoipa::ToSchema)]
pub struct VersionListResponse {
    pub versions: Vec<FileResponse>,
    pub total: u64,
}

impl FileListResponse {
    pub fn from_models(models: Vec<file_record::Model>) -> Self {
        let total = models.len() as u64;
        let files = models.into_iter().map(FileResponse::from).collect();
        Self { files, total }
    }
}

impl VersionListResponse {
    pub fn from_models(models: Vec<file_record::Model>) -> Self {
        let total = models.len() as u64;
        let versions = models.into_iter().map(FileResponse::from).collect();
        Self { versions, total }
    }
}

/// Trim a submitted version note. Blank notes count as absent.
pub fn normalize_version_note(note: Option<String>) -> Result<Option<String>, AppError> {
    let Some(note) = note else {
        return Ok(None);
    };
    let note = note.trim();
    if note.is_empty() {
        return Ok(None);
    }
    if note.chars().count() > MAX_VERSION_NOTE_LEN {
        return Err(AppError::Validation(format!(
            "Version note must be at most {MAX_VERSION_NOTE_LEN} characters"
        )));
    }
    Ok(Some(note.to_string()))
}
