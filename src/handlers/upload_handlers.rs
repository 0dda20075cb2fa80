//! Server function that authorizes direct-to-provider uploads.

use crate::{
    errors::AppError,
    handlers::auth::AuthUser,
    services::signature_service::{SignatureRequest, UploadSignature},
    state::AppState,
};
use axum::{Json, extract::State};

/// `POST /api/uploads/signature`
///
/// Signs the upload parameters so the client can post chunks straight to the
/// provider without ever seeing the API secret.
pub async fn generate_upload_signature(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SignatureRequest>,
) -> Result<Json<UploadSignature>, AppError> {
    tracing::debug!(user = %user.name, timestamp = req.timestamp, "signing upload");
    let signature = state.signer.generate(&req)?;
    Ok(Json(signature))
}
