pub mod api;
pub mod config;
pub mod models;
pub mod services;

use crate::config::{ConfigError, ServerConfig, UploadPolicy};
use crate::services::stager::UploadStager;
use crate::services::verifier::StagingRegistry;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use crate::models::{
    TransportStatus, UploadDescriptor, UploadErrorKind, UploadField, UploadRequest,
    ValidationOutcome,
};
pub use crate::services::validator::{UploadValidator, validate_request};
pub use crate::services::verifier::UploadVerifier;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_files,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadReport,
            api::handlers::upload::AcceptedFile,
            api::handlers::upload::ReportedError,
            api::handlers::upload::BadRequestBody,
            api::error::ErrorResponse,
            api::handlers::health::HealthResponse,
            models::UploadErrorKind,
        )
    ),
    tags(
        (name = "uploads", description = "Upload validation endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<UploadPolicy>,
    pub stager: Arc<UploadStager>,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let policy = config.upload_policy()?;
        let stager = UploadStager::new(
            config.temp_dir.clone(),
            Arc::new(StagingRegistry::new()),
            config.transport_max_file_size,
        );

        Ok(Self {
            policy: Arc::new(policy),
            stager: Arc::new(stager),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/upload", post(api::handlers::upload::upload_files))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
