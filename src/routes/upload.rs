use axum::http::Method;

use super::registrar::{Link, ScopedRouter};
use crate::error::ConfigError;

/// Prefix shared by every upload route.
pub const UPLOAD_PREFIX: &str = "/upload";

/// Upload Router Module
///
/// `POST /upload/img`: authenticate, then require the admin role, then store
/// the image. Each guard may answer the request itself; only an authenticated
/// admin reaches the controller.
pub fn upload_routes() -> Result<ScopedRouter, ConfigError> {
    let mut router = ScopedRouter::new(UPLOAD_PREFIX)?;
    router.register(
        Method::POST,
        "/img",
        &[Link::Authenticate, Link::RequireAdmin, Link::UploadImage],
    )?;
    Ok(router)
}
