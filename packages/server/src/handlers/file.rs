use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use dossier_common::storage::{BoxReader, StoragePath, StoredBlob};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, FILE_READ, FILE_UPLOAD};
use crate::models::file::{
    FileListResponse, FileResponse, VersionListResponse, normalize_version_note,
};
use crate::state::AppState;
use crate::utils::filename::{attachment_disposition, validate_upload_filename};
use crate::versioning::{UploadedBlob, VersionedFileStore};

/// Room for multipart framing and the text fields on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn upload_body_limit(max_blob_size: u64) -> DefaultBodyLimit {
    let limit = max_blob_size.saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

#[utoipa::path(
    post,
    path = "/{project_id}/files",
    tag = "Files",
    operation_id = "uploadFile",
    summary = "Upload a new document to a project",
    description = "Stores the `file` multipart field and starts a new version chain with it as \
        version 1. Requires `file:upload` permission.",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 201, description = "Document created", body = FileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(project_id, user_id = auth_user.user_id))]
pub async fn upload_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i32>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission(FILE_UPLOAD)?;

    let upload = read_upload(multipart, &state).await?;

    let record = VersionedFileStore::new(&state.db)
        .create_initial_file(project_id, upload.into_blob(auth_user.user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(FileResponse::from(record))))
}

#[utoipa::path(
    get,
    path = "/{project_id}/files",
    tag = "Files",
    operation_id = "listProjectFiles",
    summary = "List the current documents of a project",
    description = "Returns the latest version of every document in the project. Older \
        versions are not included. Requires `file:read` permission.",
    params(("project_id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Current documents", body = FileListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(project_id))]
pub async fn list_project_files(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i32>,
) -> Result<Json<FileListResponse>, AppError> {
    auth_user.require_permission(FILE_READ)?;

    let heads = VersionedFileStore::new(&state.db)
        .list_project_files(project_id)
        .await?;

    Ok(Json(FileListResponse::from_models(heads)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Files",
    operation_id = "getFile",
    summary = "Get a stored revision",
    description = "Returns the metadata of one revision, whichever version it is. \
        Requires `file:read` permission.",
    params(("id" = String, Path, description = "File ID (UUID)")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 400, description = "Invalid file ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    auth_user.require_permission(FILE_READ)?;
    let file_id = parse_file_id(&id)?;

    let record = VersionedFileStore::new(&state.db).get_file(file_id).await?;

    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/{id}/versions",
    tag = "File Versions",
    operation_id = "uploadVersion",
    summary = "Upload a new version of a document",
    description = "Stores the `file` multipart field as the next version of the document that \
        `id` belongs to. `id` may be any version of the document, not only the current one. \
        The optional `note` field annotates the revision (defaults to \"Version N\"). \
        Requires `file:upload` permission.",
    params(("id" = String, Path, description = "ID of any version of the document")),
    request_body(content_type = "multipart/form-data", description = "File upload with optional note"),
    responses(
        (status = 201, description = "Version created", body = FileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Concurrent version upload, retry (CONFLICT)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(id, user_id = auth_user.user_id))]
pub async fn upload_version(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission(FILE_UPLOAD)?;
    let parent_id = parse_file_id(&id)?;

    let store = VersionedFileStore::new(&state.db);
    // Fail before accepting the upload body; the append re-checks under lock.
    store.get_file(parent_id).await?;

    let upload = read_upload(multipart, &state).await?;
    let note = upload.note.clone();

    let record = store
        .create_new_version(parent_id, upload.into_blob(auth_user.user_id), note)
        .await?;

    Ok((StatusCode::CREATED, Json(FileResponse::from(record))))
}

#[utoipa::path(
    get,
    path = "/{id}/versions",
    tag = "File Versions",
    operation_id = "listVersions",
    summary = "List every version of a document",
    description = "Returns the full history of the document that `id` belongs to, newest \
        version first. Requires `file:read` permission.",
    params(("id" = String, Path, description = "ID of any version of the document")),
    responses(
        (status = 200, description = "Version history", body = VersionListResponse),
        (status = 400, description = "Invalid file ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn list_versions(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VersionListResponse>, AppError> {
    auth_user.require_permission(FILE_READ)?;
    let file_id = parse_file_id(&id)?;

    let versions = VersionedFileStore::new(&state.db)
        .list_versions(file_id)
        .await?;
    if versions.is_empty() {
        return Err(AppError::NotFound("File not found".into()));
    }

    Ok(Json(VersionListResponse::from_models(versions)))
}

#[utoipa::path(
    get,
    path = "/{id}/latest",
    tag = "File Versions",
    operation_id = "getLatestVersion",
    summary = "Get the current version of a document",
    description = "Returns the latest version of the document that `id` belongs to. \
        Requires `file:read` permission.",
    params(("id" = String, Path, description = "ID of any version of the document")),
    responses(
        (status = 200, description = "Current version", body = FileResponse),
        (status = 400, description = "Invalid file ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_latest_version(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    auth_user.require_permission(FILE_READ)?;
    let file_id = parse_file_id(&id)?;

    let head = VersionedFileStore::new(&state.db).get_latest(file_id).await?;

    Ok(Json(head.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/download",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download a specific version",
    description = "Streams the content of exactly this revision under its original filename. \
        Supports ETag-based caching via If-None-Match. Requires `file:read` permission.",
    params(("id" = String, Path, description = "File ID (UUID)")),
    responses(
        (status = 200, description = "File content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 400, description = "Invalid file ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(id))]
pub async fn download_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    auth_user.require_permission(FILE_READ)?;
    let file_id = parse_file_id(&id)?;

    let record = VersionedFileStore::new(&state.db).get_file(file_id).await?;
    let path = StoragePath::parse(&record.storage_path)?;

    let etag_value = format!("\"{}\"", path.digest_hex());
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let reader = state.blob_store.read_stream(&path).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let content_type = record
        .mime_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, record.byte_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&record.original_name),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

fn parse_file_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid file ID".into()))
}

/// Body-limit rejections surface as multipart errors mid-stream.
fn multipart_error(err: MultipartError, state: &AppState) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            limit: state.config.storage.max_blob_size,
        }
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// A multipart upload whose file content is already in the blob store.
struct ParsedUpload {
    stored: StoredBlob,
    filename: String,
    note: Option<String>,
}

impl ParsedUpload {
    fn into_blob(self, uploader_id: i32) -> UploadedBlob {
        let mime_type = mime_guess::from_path(&self.filename)
            .first()
            .map(|m| m.to_string());
        UploadedBlob {
            uploader_id,
            original_name: self.filename,
            mime_type,
            byte_size: i64::try_from(self.stored.size).unwrap_or(i64::MAX),
            storage_path: self.stored.path.to_string(),
        }
    }
}

/// Read the `file` and optional `note` fields, storing the file as it arrives.
async fn read_upload(mut multipart: Multipart, state: &AppState) -> Result<ParsedUpload, AppError> {
    let mut file: Option<(StoredBlob, String)> = None;
    let mut note: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, state))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
                let filename = validate_upload_filename(filename)
                    .map_err(|e| AppError::Validation(e.message().into()))?
                    .to_string();
                let stored = stream_field_to_store(field, state).await?;
                file = Some((stored, filename));
            }
            Some("note") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, state))?;
                note = Some(text);
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let (stored, filename) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    Ok(ParsedUpload {
        stored,
        filename,
        note: normalize_version_note(note)?,
    })
}

/// Spool a multipart field to a temp file, then hand it to the blob store.
async fn stream_field_to_store(
    mut field: Field<'_>,
    state: &AppState,
) -> Result<StoredBlob, AppError> {
    let max_size = state.config.storage.max_blob_size;
    let temp_path = std::env::temp_dir().join(format!("dossier-upload-{}", Uuid::new_v4()));

    let result = async {
        let mut temp_file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut total_size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, state))?
        {
            total_size += chunk.len() as u64;
            if total_size > max_size {
                return Err(AppError::PayloadTooLarge { limit: max_size });
            }
            temp_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }

        temp_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
        drop(temp_file);

        let file = tokio::fs::File::open(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?;
        let reader: BoxReader = Box::new(file);
        Ok(state.blob_store.write_stream(reader).await?)
    }
    .await;

    // Best effort.
    let _ = tokio::fs::remove_file(&temp_path).await;

    result
}
