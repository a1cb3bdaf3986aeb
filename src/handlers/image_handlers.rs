//! Serves stored images back at the URLs recorded in `image_reference`.

use crate::{
    errors::{AppError, error_chain},
    models::attachment::{BlobMeta, StorageKey},
    services::blob_store::BlobStoreError,
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};

/// `GET /images/{*key}`: stream a stored image.
pub async fn get_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let key = StorageKey::new(key);
    let download = state
        .orchestrator
        .blob_store()
        .get(&key)
        .await
        .map_err(|err| match err {
            BlobStoreError::NotFound(_) | BlobStoreError::Rejected { .. } => {
                AppError::not_found(format!("image `{key}` not found"))
            }
            other => {
                tracing::error!(key = %key, error = %error_chain(&other), "image read failed");
                AppError::internal("BLOB_READ_ERROR")
            }
        })?;

    let mut response = Response::new(Body::from_stream(download.body));
    *response.status_mut() = StatusCode::OK;
    set_image_headers(response.headers_mut(), &download.meta);
    Ok(response)
}

fn set_image_headers(headers: &mut HeaderMap, meta: &BlobMeta) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes));

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&meta.stored_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
