use axum::{
    Json,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    config::{AppConfig, Env},
    models::{ADMIN_ROLE, ErrorBody, User},
    repository::RepositoryState,
};

/// Header accepted as an identity shortcut in `Env::Local`.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload expected inside a bearer token (HS256).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID, looked up in `public.profiles`.
    pub sub: Uuid,
    /// Expiration time (seconds since epoch). Always validated.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

/// AuthUser
///
/// Resolved identity of an authenticated request. The `authenticate` link
/// stores it in the request extensions for the links that follow.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    /// 'student' or 'admin'.
    pub role: String,
}

impl AuthUser {
    /// The only role check in the service. Roles compare case-sensitively.
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. Local bypass: in `Env::Local`, a known UUID in `x-user-id`.
/// 2. `Authorization: Bearer <jwt>` decoded with the configured secret.
/// 3. Database lookup of the subject, which also yields the current role.
///
/// Rejection: `StatusCode::UNAUTHORIZED` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get(LOCAL_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());

            if let Some(user_id) = bypass_id {
                // The UUID must still map to a real profile so the role is loaded.
                if let Some(user) = repo.get_user(user_id).await {
                    return Ok(user.into());
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!("rejected bearer token: {:?}", e.kind());
            StatusCode::UNAUTHORIZED
        })?;

        // A valid token for a deleted user is still rejected.
        let user = repo
            .get_user(token_data.claims.sub)
            .await
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(user.into())
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

/// authenticate
///
/// First guard of a protected chain. Resolves the caller and hands the
/// `AuthUser` to the rest of the chain through the request extensions, or
/// answers 401 without calling onward.
pub async fn authenticate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    match AuthUser::from_request_parts(&mut parts, &state).await {
        Ok(user) => {
            tracing::debug!(user_id = %user.id, role = %user.role, "authenticated");
            parts.extensions.insert(user);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(status) => {
            tracing::info!(uri = %parts.uri, "authentication failed");
            reject(status, "invalid or missing credentials")
        }
    }
}

/// require_admin
///
/// Admin-permission guard. Must run after `authenticate`; a request that
/// reaches it without an identity is treated as unauthenticated.
pub async fn require_admin(request: Request, next: Next) -> Response {
    let Some(user) = request.extensions().get::<AuthUser>() else {
        return reject(StatusCode::UNAUTHORIZED, "invalid or missing credentials");
    };

    if !user.is_admin() {
        tracing::info!(user_id = %user.id, role = %user.role, "admin permission denied");
        return reject(StatusCode::FORBIDDEN, "admin permission required");
    }

    next.run(request).await
}
