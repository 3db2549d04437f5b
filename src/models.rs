use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Schemas (Mapped to Database) ---

/// User
///
/// Identity record stored in the `public.profiles` table. Only the fields the
/// auth layer needs are loaded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    // The RBAC field: 'student' or 'admin'.
    pub role: String,
}

/// Role value granting access to administrative routes.
pub const ADMIN_ROLE: &str = "admin";

/// ImageRecord
///
/// One stored image, as persisted in the `public.images` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ImageRecord {
    pub id: Uuid,
    // Object key inside the storage bucket.
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    // FK to public.profiles.id (the admin who uploaded it).
    pub uploaded_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Response Schemas ---

/// UploadImageResponse
///
/// Body returned by `POST /upload/img` once the image is stored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UploadImageResponse {
    pub id: Uuid,
    /// Public URL of the stored image.
    #[schema(example = "http://localhost:9000/uploads/img/2026/10/0b7f.png")]
    pub url: String,
    /// Object key, used to reference the image from other records.
    pub key: String,
    #[schema(example = "image/png")]
    pub content_type: String,
    /// Size of the stored payload in bytes.
    pub size: u64,
}

impl From<ImageRecord> for UploadImageResponse {
    fn from(record: ImageRecord) -> Self {
        Self {
            id: record.id,
            url: record.url,
            key: record.key,
            content_type: record.content_type,
            size: record.size_bytes.max(0) as u64,
        }
    }
}

/// ErrorBody
///
/// Uniform JSON error payload for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

// --- Request Schemas ---

/// UploadImageForm
///
/// Documentation-only description of the multipart body of `POST /upload/img`.
/// The controller reads the parts directly from the stream.
#[derive(Debug, ToSchema)]
pub struct UploadImageForm {
    /// The image file (png, jpeg, gif or webp). `image` is accepted as an alias.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
