//! Upload, list and download handlers

use super::ShareState;
use crate::ShareEvent;
use crate::error::ShareError;
use crate::session::{Direction, TransferSession};
use crate::storage::validate_file_name;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::Field},
    http::{HeaderValue, header},
    response::Response,
};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Multipart field carrying the uploaded files
pub const UPLOAD_FIELD: &str = "files";

/// Read buffer for streaming downloads (256KB - optimized for LAN)
pub const CHUNK_SIZE: usize = 256 * 1024;

/// POST /upload
pub async fn upload_handler(
    State(state): State<ShareState>,
    mut multipart: Multipart,
) -> Result<String, ShareError> {
    let upload_id = Uuid::new_v4().simple().to_string()[..8].to_string();
    let mut stored: Vec<String> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ShareError::transport(e.body_text()))?
    {
        // Plain form fields and empty file inputs carry nothing to store
        let file_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        if field.name() != Some(UPLOAD_FIELD) {
            tracing::warn!("[{}] Unexpected upload field {:?}", upload_id, field.name());
            return Err(ShareError::InvalidInput("Unexpected field".to_string()));
        }

        validate_file_name(&file_name)?;

        let bytes = receive_part(&state, &upload_id, &file_name, field).await?;
        let _ = state
            .event_tx
            .send(ShareEvent::UploadReceived {
                upload_id: upload_id.clone(),
                file_name: file_name.clone(),
                bytes,
            })
            .await;
        stored.push(file_name);
    }

    if stored.is_empty() {
        return Err(ShareError::InvalidInput("No files uploaded.".to_string()));
    }

    tracing::info!("[{}] Upload complete: {}", upload_id, stored.join(", "));
    Ok(format!("Uploaded: {}", stored.join(", ")))
}

/// Stream one multipart file part to disk, tracking it with a request-scoped session
async fn receive_part(
    state: &ShareState,
    upload_id: &str,
    file_name: &str,
    mut field: Field<'_>,
) -> Result<u64, ShareError> {
    let mut session = TransferSession::start(Direction::Upload, file_name, None);
    let mut file = state.store.create(file_name).await?;

    tracing::info!("[{}] Receiving {}", upload_id, file_name);

    let outcome = loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = file.write_all(&chunk).await {
                    break Err(ShareError::Storage(format!("Write error: {}", e)));
                }
                if let Err(e) = session.on_chunk(chunk.len() as u64) {
                    break Err(e.into());
                }
                tracing::debug!(
                    "[{}] {}: {} bytes so far",
                    upload_id,
                    file_name,
                    session.transferred_bytes()
                );
            }
            Ok(None) => match file.flush().await {
                Ok(()) => break Ok(()),
                Err(e) => break Err(ShareError::Storage(format!("Flush error: {}", e))),
            },
            Err(e) => break Err(ShareError::transport(e.body_text())),
        }
    };

    match outcome {
        Ok(()) => {
            session.complete()?;
            tracing::info!(
                "[{}] Stored {} ({} bytes)",
                upload_id,
                file_name,
                session.transferred_bytes()
            );
            Ok(session.transferred_bytes())
        }
        Err(err) => {
            let reason = err.to_string();
            session.fail(reason.clone())?;
            drop(file);
            state.store.discard(file_name).await;

            tracing::error!("[{}] Upload of {} failed: {}", upload_id, file_name, reason);
            let _ = state
                .event_tx
                .send(ShareEvent::UploadFailed {
                    upload_id: upload_id.to_string(),
                    file_name: file_name.to_string(),
                    reason,
                })
                .await;
            Err(err)
        }
    }
}

/// GET /files
pub async fn list_handler(State(state): State<ShareState>) -> Result<Json<Vec<String>>, ShareError> {
    let files = state.store.list().await.inspect_err(|e| {
        tracing::error!("Listing {:?} failed: {}", state.store.root(), e);
    })?;
    Ok(Json(files))
}

/// GET /download/{filename}
pub async fn download_handler(
    State(state): State<ShareState>,
    Path(file_name): Path<String>,
) -> Result<Response, ShareError> {
    validate_file_name(&file_name).inspect_err(|_| {
        tracing::warn!("Rejected download of unsafe name {:?}", file_name);
    })?;

    let (file, len) = state.store.open(&file_name).await?;
    let mime = mime_guess::from_path(&file_name).first_or_octet_stream();

    let body = Body::from_stream(ReaderStream::with_capacity(file, CHUNK_SIZE));
    let response = Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition(&file_name))
        .body(body)
        .map_err(|e| ShareError::Storage(format!("Cannot build response: {}", e)))?;

    tracing::info!("Serving {} ({} bytes)", file_name, len);
    let _ = state
        .event_tx
        .send(ShareEvent::DownloadServed {
            file_name,
            bytes: len,
        })
        .await;

    Ok(response)
}

/// `attachment` disposition with an RFC 5987 encoded filename
fn content_disposition(file_name: &str) -> HeaderValue {
    let mut encoded = String::with_capacity(file_name.len());
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    HeaderValue::from_str(&format!("attachment; filename*=UTF-8''{}", encoded))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
