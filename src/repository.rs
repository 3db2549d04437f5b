use crate::models::{ImageRecord, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Persistence contract used by the auth layer and the upload controller.
/// Handlers only see `Arc<dyn Repository>`, so tests swap in in-memory fakes.
#[async_trait]
pub trait Repository: Send + Sync {
    // Resolves a user and their current role. `None` when the user is unknown.
    async fn get_user(&self, id: Uuid) -> Option<User>;

    // Persists the metadata of a stored image and returns the saved row.
    async fn record_image(&self, image: ImageRecord) -> Result<ImageRecord, String>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_user
    ///
    /// Looks up the profile row. Errors are logged and treated as "not found" so
    /// the auth layer rejects the request instead of leaking a 500.
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, email, role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn record_image(&self, image: ImageRecord) -> Result<ImageRecord, String> {
        sqlx::query_as::<_, ImageRecord>(
            r#"INSERT INTO images (id, key, url, content_type, size_bytes, uploaded_by, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, key, url, content_type, size_bytes, uploaded_by, created_at"#,
        )
        .bind(image.id)
        .bind(&image.key)
        .bind(&image.url)
        .bind(&image.content_type)
        .bind(image.size_bytes)
        .bind(image.uploaded_by)
        .bind(image.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("record_image error: {:?}", e);
            e.to_string()
        })
    }
}
