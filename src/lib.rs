use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::{OpenApi, openapi::server::Server};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Route tables and the concrete route declarations.
pub mod routes;
use routes::{public, upload};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ConfigError, UploadError};
pub use repository::{PostgresRepository, RepositoryState};
pub use routes::registrar::{Link, RouteDescriptor, ScopedRouter};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for the service, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::upload_img),
    components(
        schemas(
            models::UploadImageResponse, models::UploadImageForm, models::ErrorBody,
            models::ImageRecord,
        )
    ),
    tags(
        (name = "upload-router", description = "Image upload API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable container of the services every request may need.
#[derive(Clone)]
pub struct AppState {
    /// Profiles and image metadata.
    pub repo: RepositoryState,
    /// Object storage receiving the image bytes.
    pub storage: StorageState,
    pub config: AppConfig,
}

// Lets extractors such as `AuthUser` pull single components out of the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// route_table
///
/// The upload routes as they will be mounted for `config`, without building
/// the router. Used for startup logging and checks.
pub fn route_table(config: &AppConfig) -> Result<Vec<RouteDescriptor>, ConfigError> {
    Ok(upload::upload_routes()?
        .nest_under(&config.api_prefix)?
        .routes())
}

/// create_router
///
/// Assembles the full routing structure and its middleware stack.
///
/// # Errors
/// Returns the `ConfigError` of the first route that fails validation. Callers
/// must treat it as fatal.
pub fn create_router(state: AppState) -> Result<Router, ConfigError> {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Upload routes sit below the optional parent prefix (API_PREFIX).
    let upload_routes = upload::upload_routes()?.nest_under(&state.config.api_prefix)?;

    // Documented paths are relative to the parent prefix.
    let mut api_doc = ApiDoc::openapi();
    let parent = state.config.api_prefix.trim_end_matches('/');
    if !parent.is_empty() {
        api_doc.servers = Some(vec![Server::new(parent)]);
    }

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc))
        .merge(public::public_routes())
        .merge(upload_routes.into_router(&state))
        .with_state(state);

    // Outermost layers: request id, tracing span, id propagation, then CORS.
    Ok(base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors))
}

/// trace_span_logger
///
/// Builds the per-request span, tagged with the `x-request-id` so every log
/// line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
