//! File and conversion API handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use opener_core::{
    mime_for_extension, AssetId, AssetSummary, ControllerError, JobId, MediaContent, Operation,
    PreviewHandle,
};

use crate::state::AppState;

const DEFAULT_FILE_NAME: &str = "upload.bin";

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MetadataRequest {
    pub asset_id: AssetId,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackErrorRequest {
    pub asset_id: AssetId,
}

#[derive(Debug, Serialize)]
pub struct AppliedResponse {
    /// False when the report referred to an asset that is no longer current.
    pub applied: bool,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct DismissResponse {
    pub dismissed: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn controller_error(err: ControllerError) -> ApiError {
    let status = match &err {
        ControllerError::Validation(_) => StatusCode::PAYLOAD_TOO_LARGE,
        ControllerError::NoAsset | ControllerError::JobActive { .. } => StatusCode::CONFLICT,
        ControllerError::ConversionDisabled => StatusCode::SERVICE_UNAVAILABLE,
        ControllerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
    };
    api_error(status, err.notice())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/file
///
/// Select a file via multipart upload. The `file` field carries the bytes;
/// an optional `mime` field overrides the part's content type.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AssetSummary>, ApiError> {
    let mut data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut part_mime: Option<String> = None;
    let mut mime_override: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read multipart upload: {}", e);
                return Err(api_error(e.status(), e.body_text()));
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                part_mime = field.content_type().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => data = Some(bytes.to_vec()),
                    Err(e) => {
                        warn!("Failed to read uploaded file: {}", e);
                        return Err(api_error(e.status(), e.body_text()));
                    }
                }
            }
            "mime" => match field.text().await {
                Ok(text) if !text.is_empty() => mime_override = Some(text),
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read mime override: {}", e);
                    return Err(api_error(e.status(), e.body_text()));
                }
            },
            _ => {}
        }
    }

    let data = match data {
        Some(d) => d,
        None => return Err(api_error(StatusCode::BAD_REQUEST, "No file provided")),
    };

    let file_name = file_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
    let mime = mime_override
        .or(part_mime.filter(|m| m != "application/octet-stream"))
        .unwrap_or_else(|| {
            let ext = file_name.rsplit('.').next().unwrap_or_default();
            mime_for_extension(ext).to_string()
        });
    let size = data.len() as u64;

    debug!(name = %file_name, size, mime = %mime, "Received upload");

    state
        .controller()
        .select_file(MediaContent::from(data), file_name, size, mime)
        .await
        .map(Json)
        .map_err(controller_error)
}

/// DELETE /api/v1/file
pub async fn clear_file(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller().clear().await;
    StatusCode::NO_CONTENT
}

/// POST /api/v1/file/metadata
pub async fn attach_metadata(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MetadataRequest>,
) -> Json<AppliedResponse> {
    let applied = state
        .controller()
        .attach_metadata(
            request.asset_id,
            request.duration_secs,
            request.width,
            request.height,
        )
        .await;
    Json(AppliedResponse { applied })
}

/// POST /api/v1/file/playback-error
pub async fn report_playback_error(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaybackErrorRequest>,
) -> Json<AppliedResponse> {
    let applied = state
        .controller()
        .report_playback_error(request.asset_id)
        .await;
    Json(AppliedResponse { applied })
}

/// POST /api/v1/convert
///
/// Starts a conversion of the current file. The job settles asynchronously;
/// follow it through `/state` or the WebSocket.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    Json(operation): Json<Operation>,
) -> Result<(StatusCode, Json<ConvertResponse>), ApiError> {
    let job_id = state
        .controller()
        .request_conversion(operation)
        .await
        .map_err(controller_error)?;
    Ok((StatusCode::ACCEPTED, Json(ConvertResponse { job_id })))
}

/// POST /api/v1/error/dismiss
pub async fn dismiss_error(State(state): State<Arc<AppState>>) -> Json<DismissResponse> {
    let dismissed = state.controller().dismiss_error().await;
    Json(DismissResponse { dismissed })
}

/// GET /api/v1/download
pub async fn download(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let download = state
        .controller()
        .download()
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No file loaded"))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.file_name.replace(['"', '\\'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, download.mime),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(download.content.as_bytes().to_vec()),
    )
        .into_response())
}

/// GET /api/v1/preview/{id}
///
/// Serves the bytes behind a live preview handle. Revoked handles are gone.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || api_error(StatusCode::NOT_FOUND, "Preview not found");

    let handle = PreviewHandle::from_id(&id).ok_or_else(not_found)?;
    let content = state
        .controller()
        .resolve_preview(&handle)
        .await
        .ok_or_else(not_found)?;

    let mime = state
        .controller()
        .snapshot()
        .await
        .asset
        .filter(|asset| asset.preview.as_ref() == Some(&handle))
        .map(|asset| asset.mime_hint)
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        [(header::CONTENT_TYPE, mime)],
        Body::from(content.as_bytes().to_vec()),
    )
        .into_response())
}
