//! Download session handler.
//!
//! The stored set answers 404s before anything touches the filesystem or
//! the Overseer; only known ids cost a token-verification round trip.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadQuery {
    token: Option<String>,
}

pub(crate) async fn handle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Response {
    if !state.inventory.is_stored(&id) {
        return (
            StatusCode::NOT_FOUND,
            "Nothing stored with that identifier.",
        )
            .into_response();
    }

    let token = query
        .token
        .or_else(|| bearer_token(&headers))
        .unwrap_or_default();

    let verdict = match state.overseer.verify_download_token(token, id.clone()).await {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(%id, error = %e, "download token verification failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Couldn't verify the download token, try again later.",
            )
                .into_response();
        }
    };

    if !verdict.allowed {
        return (
            StatusCode::UNAUTHORIZED,
            "You don't have permission to download that!",
        )
            .into_response();
    }

    // Fire-and-forget: the Overseer records the download whether or not
    // the client sticks around for the whole stream.
    if let Err(e) = state.overseer.notify_downloaded(id.clone()).await {
        warn!(%id, error = %e, "couldn't notify overseer of download");
    }

    let path = match state.inventory.item_path(&id) {
        Ok(path) => path,
        Err(e) => {
            warn!(%id, error = %e, "stored id failed path resolution");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(%id, error = %e, "failed to open stored item");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    if let Ok(meta) = file.metadata().await {
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.len()));
    }
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_disposition(&verdict.name),
    );

    info!(%id, name = %verdict.name, "serving download");

    let stream = ReaderStream::new(file);
    (response_headers, Body::from_stream(stream)).into_response()
}

/// Extracts a token from an `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Builds the attachment header from the Overseer-supplied display name,
/// so downloads aren't named after a bare UUID.
fn attachment_disposition(name: &str) -> HeaderValue {
    // Header values are ASCII; anything else in the display name is dropped.
    let safe: String = name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"')
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}.zip\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer my-token"),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("my-token"));

        let empty = HeaderMap::new();
        assert!(bearer_token(&empty).is_none());
    }

    #[test]
    fn disposition_quotes_and_controls_are_stripped() {
        let value = attachment_disposition("My \"Cool\"\nItem");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"My CoolItem.zip\""
        );
    }

    #[test]
    fn disposition_drops_non_ascii() {
        let value = attachment_disposition("véry ünicode");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"vry nicode.zip\""
        );
    }
}
