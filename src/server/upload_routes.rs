//! Upload route.

use super::error::ApiError;
use super::state::{GuardedUploadStore, ServerState};
use crate::upload::{derive_base_name, StoredUpload, UploadError};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection}, DefaultBodyLimit, Multipart,
        State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info};

/// Largest accepted upload request (audio masters can be big).
const MAX_UPLOAD_BODY_BYTES: usize = 512 * 1024 * 1024;

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_path: Option<String>,
}

struct IncomingFile {
    file_name: Option<String>,
    data: Bytes,
}

fn invalid_field(err: MultipartError) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge(err.body_text())
    } else {
        UploadError::InvalidField(err.body_text())
    }
}

/// POST /api/upload - multipart form with optional `title`, `image` and `audio`
async fn upload_files(
    State(store): State<GuardedUploadStore>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut title: Option<String> = None;
    let mut image: Option<IncomingFile> = None;
    let mut audio: Option<IncomingFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_field)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "title" => title = Some(field.text().await.map_err(invalid_field)?),
            "image" | "audio" => {
                let file_name = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(invalid_field)?;
                // Browsers send an empty part for a file input left blank.
                if data.is_empty() && file_name.as_deref().unwrap_or("").is_empty() {
                    continue;
                }
                if file_name.is_none() {
                    return Err(UploadError::MissingFile(field_name).into());
                }
                let incoming = IncomingFile { file_name, data };
                if field_name == "image" {
                    image = Some(incoming);
                } else {
                    audio = Some(incoming);
                }
            }
            other => debug!("Ignoring upload field {:?}", other),
        }
    }

    let base = derive_base_name(title.as_deref());
    let mut written: Vec<StoredUpload> = Vec::new();
    let mut response = UploadResponse::default();

    for (kind, incoming) in [("image", image), ("audio", audio)] {
        let Some(incoming) = incoming else {
            continue;
        };
        match store
            .store(&base, incoming.file_name.as_deref(), &incoming.data)
            .await
        {
            Ok(stored) => {
                info!(
                    "Stored {} upload at {} ({} bytes)",
                    kind,
                    stored.path.display(),
                    incoming.data.len()
                );
                if kind == "image" {
                    response.image_path = Some(stored.public_path.clone());
                } else {
                    response.audio_path = Some(stored.public_path.clone());
                }
                written.push(stored);
            }
            Err(err) => {
                for stored in &written {
                    store.discard(stored).await;
                }
                return Err(err.into());
            }
        }
    }

    Ok(Json(response))
}

pub fn upload_routes() -> Router<ServerState> {
    upload_routes_with_limit(MAX_UPLOAD_BODY_BYTES)
}

fn upload_routes_with_limit(max_body_bytes: usize) -> Router<ServerState> {
    Router::new()
        .route("/api/upload", post(upload_files))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
