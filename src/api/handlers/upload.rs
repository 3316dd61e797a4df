use crate::AppState;
use crate::api::error::{AppError, ErrorResponse};
use crate::models::{UploadDescriptor, UploadErrorKind, ValidationOutcome};
use crate::services::validator::validate_request;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportedError {
    pub kind: UploadErrorKind,
    pub code: u8,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadReport {
    pub field_present: bool,
    pub success: bool,
    pub files: Vec<AcceptedFile>,
    pub errors: Vec<ReportedError>,
}

/// A 400 carries a report when the field is missing and an error when the body is malformed.
#[derive(Serialize, ToSchema)]
#[serde(untagged)]
pub enum BadRequestBody {
    Report(UploadReport),
    Error(ErrorResponse),
}

impl From<&UploadDescriptor> for AcceptedFile {
    fn from(file: &UploadDescriptor) -> Self {
        Self {
            name: file.declared_name.clone(),
            mime_type: file.declared_mime_type.clone(),
            size: file.size_bytes,
        }
    }
}

impl From<&ValidationOutcome> for UploadReport {
    fn from(outcome: &ValidationOutcome) -> Self {
        Self {
            field_present: outcome.field_present,
            success: outcome.success,
            files: outcome.accepted_files.iter().map(AcceptedFile::from).collect(),
            errors: outcome
                .errors
                .iter()
                .map(|&kind| ReportedError {
                    kind,
                    code: kind.code(),
                })
                .collect(),
        }
    }
}

impl UploadReport {
    pub fn status_code(&self) -> StatusCode {
        if self.success {
            StatusCode::OK
        } else if !self.field_present {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content = String,
        description = "Multipart form carrying the configured upload field",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "All files passed validation", body = UploadReport),
        (status = 400, description = "Upload field missing (report) or malformed multipart body (error)", body = BadRequestBody),
        (status = 422, description = "One or more files were rejected", body = UploadReport)
    ),
    tag = "uploads"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadReport>), AppError> {
    let staged = state.stager.stage(multipart).await?;

    let outcome = validate_request(
        &state.policy,
        state.stager.registry().as_ref(),
        staged.request(),
    );

    // Staged files are released when `staged` drops at the end of the request.
    let report = UploadReport::from(&outcome);
    Ok((report.status_code(), Json(report)))
}
