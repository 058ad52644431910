use crate::api::error::AppError;
use crate::services::remote::{ResourceKind, UploadOptions};
use crate::services::staging::StagedFile;
use axum::{
    Json,
    extract::{Multipart, State},
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct AssetResponse {
    /// Canonical remote locator for later retrieval
    pub locator: String,
    pub kind: ResourceKind,
    pub original_name: String,
    pub bytes: u64,
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "Asset upload"),
    responses(
        (status = 200, description = "Asset committed to remote storage", body = AssetResponse),
        (status = 400, description = "No file provided or malformed request"),
        (status = 413, description = "Payload too large"),
        (status = 502, description = "Remote store rejected the upload")
    ),
    tag = "assets"
)]
pub async fn upload_asset(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<AssetResponse>, AppError> {
    // Capture errors in a result so the multipart stream can still be
    // consumed on the failure arm below.
    let result: Result<Json<AssetResponse>, AppError> = async {
        let mut options = UploadOptions::default();
        let mut staged: Option<StagedFile> = None;

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("length limit exceeded") {
                AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed limit".to_string(),
                )
            } else {
                AppError::BadRequest(err_msg)
            }
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let original_filename = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field.content_type().map(|s| s.to_string());

                let body_with_io_error = field.map_err(std::io::Error::other);
                let reader = StreamReader::new(body_with_io_error);

                staged = Some(
                    state
                        .ingest
                        .stage_upload(&original_filename, content_type.as_deref(), reader)
                        .await?,
                );
            } else if name == "folder" {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    options.folder = Some(text);
                }
            } else {
                // Remaining form fields belong to downstream business
                // handling; the pipeline only has to drain them.
                let _ = field.text().await;
            }
        }

        let staged = staged.ok_or(AppError::BadRequest("No file provided".to_string()))?;
        let original_name = staged.original_name.clone();

        let asset = state.ingest.commit_upload(staged, options).await?;

        Ok(Json(AssetResponse {
            locator: asset.locator,
            kind: asset.kind,
            original_name,
            bytes: asset.bytes,
        }))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Consume the remaining multipart stream to avoid a TCP reset
            // ("Network error" in the browser) on early rejection
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}
