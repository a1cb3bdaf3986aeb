//! Defines routes for the catalog service.
//!
//! - `GET  /`              -> list every catalog record (JSON)
//! - `POST /`              -> create a record from a multipart form with an `image` file
//! - `POST /delete`        -> delete the records named by repeated `ids` fields
//! - `GET  /images/{*key}` -> serve a stored image
//! - `GET  /healthz`, `GET /readyz` -> liveness and readiness

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        image_handlers::get_image,
        record_handlers::{create_record, delete_records, list_records},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Room for the text fields and multipart framing around the image itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the router with its shared state attached.
///
/// The create route's body limit sits a little above the image limit so an
/// oversized image is reported by the handler as 413 with a clear message.
pub fn routes(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/",
            get(list_records)
                .post(create_record)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/delete", post(delete_records))
        .route("/images/{*key}", get(get_image))
        .with_state(state)
}
