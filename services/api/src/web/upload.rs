//! services/api/src/web/upload.rs
//!
//! The multipart upload endpoint. Each file is streamed chunk by chunk and
//! refused as soon as it crosses the configured size ceiling, before the rest
//! of its bytes are read.

use crate::error::{ApiError, ApiResult};
use crate::web::payloads::{normalize_user_id, FileResponse, UploadResponse};
use crate::web::state::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::StatusCode,
    response::Json,
};
use bytes::BytesMut;
use research_assistant_core::domain::NewFile;
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on the number of files accepted in one request.
pub const MAX_FILES_PER_UPLOAD: usize = 10;

/// A file part that has been read but not yet stored.
struct PendingFile {
    name: String,
    content_type: String,
    data: BytesMut,
}

/// Text content stored for an upload. `text/*` files are decoded as UTF-8
/// (invalid sequences are replaced); other types get a metadata placeholder
/// instead of their bytes.
pub fn extract_content(name: &str, content_type: &str, data: &[u8]) -> String {
    if content_type.starts_with("text/") {
        String::from_utf8_lossy(data).into_owned()
    } else {
        format!("Binary file: {} ({} bytes)", name, data.len())
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::UploadRejected(e.body_text())
    } else {
        ApiError::Validation(vec![format!("files: {}", e.body_text())])
    }
}

/// Reads one file part, failing once it grows past `max_bytes`.
async fn read_capped(field: &mut Field<'_>, name: &str, max_bytes: usize) -> ApiResult<BytesMut> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if data.len() + chunk.len() > max_bytes {
            return Err(ApiError::UploadRejected(format!(
                "{} exceeds the {} byte limit",
                name, max_bytes
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Upload one or more documents.
///
/// Accepts multipart/form-data with any number of `files` parts and an
/// optional `userId` text part.
#[utoipa::path(
    post,
    path = "/api/files/upload",
    request_body(content_type = "multipart/form-data", description = "`files` parts and an optional `userId` field."),
    responses(
        (status = 200, description = "Files stored", body = UploadResponse),
        (status = 400, description = "No files or malformed form"),
        (status = 413, description = "A file exceeds the size limit")
    )
)]
pub async fn upload_files_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let max_bytes = app_state.config.max_upload_bytes;
    let mut user_id = None;
    let mut pending = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("userId") => {
                user_id = normalize_user_id(Some(field.text().await.map_err(multipart_error)?));
            }
            Some("files") => {
                if pending.len() == MAX_FILES_PER_UPLOAD {
                    return Err(ApiError::UploadRejected(format!(
                        "at most {} files per request",
                        MAX_FILES_PER_UPLOAD
                    )));
                }
                let name = field.file_name().unwrap_or("untitled").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = read_capped(&mut field, &name, max_bytes).await?;
                pending.push(PendingFile {
                    name,
                    content_type,
                    data,
                });
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    if pending.is_empty() {
        return Err(ApiError::Validation(vec!["files: No files uploaded".to_string()]));
    }

    // `userId` may arrive after the file parts, so ownership is applied last.
    let mut stored: Vec<FileResponse> = Vec::with_capacity(pending.len());
    for file in pending {
        let content = extract_content(&file.name, &file.content_type, &file.data);
        let uploaded = app_state
            .store
            .upload_file(NewFile {
                name: file.name,
                size: file.data.len() as u64,
                content_type: file.content_type,
                content: Some(content),
                user_id: user_id.clone(),
            })
            .await?;
        info!("Stored upload {} ({} bytes)", uploaded.name, uploaded.size);
        stored.push(uploaded.into());
    }

    Ok(Json(UploadResponse { files: stored }))
}
