use crate::{
    AppState,
    auth::AuthUser,
    error::UploadError,
    models::{ImageRecord, UploadImageForm, UploadImageResponse},
};
use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

/// Image formats accepted by `upload_img`: (MIME type, stored extension).
pub const ALLOWED_IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Multipart field names that carry the image.
const FILE_FIELDS: [&str; 2] = ["file", "image"];

/// resolve_image_type
///
/// Picks the MIME type and extension of an uploaded part. The declared content
/// type wins; a missing or generic (`application/octet-stream`) one falls back
/// to the filename extension.
pub fn resolve_image_type(
    content_type: Option<&str>,
    file_name: Option<&str>,
) -> Result<(&'static str, &'static str), UploadError> {
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    if let Some(ct) = declared {
        let ct = if ct == "image/jpg" { "image/jpeg".to_string() } else { ct };
        return ALLOWED_IMAGE_TYPES
            .iter()
            .find(|(mime, _)| *mime == ct)
            .copied()
            .ok_or(UploadError::UnsupportedType(ct));
    }

    let ext = file_name
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| UploadError::UnsupportedType("unknown".to_string()))?;

    let ext = if ext == "jpeg" { "jpg".to_string() } else { ext };
    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(_, known)| *known == ext)
        .copied()
        .ok_or(UploadError::UnsupportedType(ext))
}

fn multipart_error(e: MultipartError, limit: usize) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { limit }
    } else {
        UploadError::Multipart(e.body_text())
    }
}

/// upload_img
///
/// [Admin Route] Stores one image and records it.
///
/// Runs last in the `authenticate -> require_admin -> upload_img` chain, so the
/// caller identity is already in the request extensions. The documented path
/// is relative to `API_PREFIX`, which the document lists as its server.
#[utoipa::path(
    post,
    path = "/upload/img",
    request_body(content = UploadImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = UploadImageResponse),
        (status = 400, description = "Missing or empty file"),
        (status = 401, description = "Invalid or missing credentials"),
        (status = 403, description = "Caller is not an admin"),
        (status = 413, description = "Image too large"),
        (status = 415, description = "Unsupported image type"),
        (status = 502, description = "Storage failure")
    )
)]
pub async fn upload_img(
    Extension(user): Extension<AuthUser>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadImageResponse>), UploadError> {
    let limit = state.config.max_image_bytes;
    let mut image: Option<(&'static str, &'static str, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let is_file_field = field
            .name()
            .map(|name| FILE_FIELDS.contains(&name))
            .unwrap_or(false);
        if !is_file_field || image.is_some() {
            continue;
        }

        let (mime, ext) = resolve_image_type(field.content_type(), field.file_name())?;
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        if data.len() > limit {
            return Err(UploadError::TooLarge { limit });
        }
        if data.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        image = Some((mime, ext, data.to_vec()));
    }

    let (content_type, extension, data) = image.ok_or(UploadError::MissingFile)?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let key = format!("img/{}/{}.{}", now.format("%Y/%m"), id, extension);
    let size = data.len();

    let url = state
        .storage
        .put_object(&key, content_type, data)
        .await
        .map_err(UploadError::Storage)?;

    let record = state
        .repo
        .record_image(ImageRecord {
            id,
            key,
            url,
            content_type: content_type.to_string(),
            size_bytes: size as i64,
            uploaded_by: user.id,
            created_at: now,
        })
        .await
        .map_err(UploadError::Persistence)?;

    tracing::info!(
        image_id = %record.id,
        key = %record.key,
        size = size,
        uploaded_by = %user.id,
        "image uploaded"
    );

    Ok((StatusCode::CREATED, Json(record.into())))
}
