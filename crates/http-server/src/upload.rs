//! Upload session handler.
//!
//! The only gate on this path is the expected-upload set: the Overseer
//! vetted the uploader before authorizing the id, so no further credential
//! is checked here. The authorization is consumed the moment the request
//! is accepted — retries need a fresh `expect-upload`.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::AppState;

pub(crate) async fn handle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    if !state.inventory.consume_expected(&id) {
        return StatusCode::PRECONDITION_FAILED.into_response();
    }

    let path = match state.inventory.item_path(&id) {
        Ok(path) => path,
        Err(e) => {
            // Unreachable for ids that passed the expected-set gate, since
            // only validated UUIDs are ever marked expected.
            warn!(%id, error = %e, "authorized id failed path resolution");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Find the file part; other form fields are ignored.
    let mut field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.file_name().is_some() => break field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                warn!(%id, "upload request carried no file part");
                return StatusCode::BAD_REQUEST.into_response();
            }
            Err(e) => {
                warn!(%id, error = %e, "failed to parse multipart body");
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    };

    info!(%id, "upload started");

    // Create-truncate overwrites any partial file a failed attempt left.
    let mut file = match tokio::fs::File::create(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(%id, error = %e, "failed to create item file");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = file.write_all(&chunk).await {
                    warn!(%id, error = %e, "failed writing upload to disk");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(%id, error = %e, "upload stream failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    if let Err(e) = file.flush().await {
        warn!(%id, error = %e, "failed flushing upload to disk");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    drop(file);

    // Report the size the disk ended up with, not what the client claimed.
    let size = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!(%id, error = %e, "failed to stat completed upload");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    state.inventory.mark_stored(&id);

    // Queued before the client sees the 200, so the Overseer never lags
    // behind a client that believes the transfer finished.
    if let Err(e) = state.overseer.notify_uploaded(id.clone(), size).await {
        warn!(%id, error = %e, "couldn't notify overseer of upload; next refresh will resync");
    }

    info!(%id, size, "upload complete");
    StatusCode::OK.into_response()
}
