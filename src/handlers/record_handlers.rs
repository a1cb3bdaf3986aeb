//! HTTP handlers for catalog records.
//! Parses form submissions into typed requests and delegates the store work
//! to `RecordOrchestrator`.

use crate::{
    errors::{AppError, error_chain},
    models::{
        attachment::Attachment,
        form::{RecordForm, parse_id},
        record::CatalogRecord,
    },
    state::AppState,
};
use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Request, State, multipart::Field},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use bytes::{Bytes, BytesMut};
use serde_json::json;
use tracing::{error, info};

const IMAGE_FIELD: &str = "image";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::new(err.status(), "BAD_MULTIPART", err.body_text())
}

fn too_large(limit: usize) -> AppError {
    AppError::new(
        StatusCode::PAYLOAD_TOO_LARGE,
        "IMAGE_TOO_LARGE",
        format!("Image exceeds the {limit} byte limit"),
    )
}

/// Buffer an image field, refusing to grow past `limit` bytes.
async fn read_image(field: &mut Field<'_>, limit: usize) -> Result<Bytes, AppError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buf.len() + chunk.len() > limit {
            return Err(too_large(limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(multipart_error)
}

/// `GET /`: every catalog record as JSON.
pub async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogRecord>>, AppError> {
    Ok(Json(state.orchestrator.list().await?))
}

/// `POST /`: create a record from `id`, `name`, `quantity` and an `image`
/// file field, then redirect back to the listing.
pub async fn create_record(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut form = RecordForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some(IMAGE_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let bytes = read_image(&mut field, state.max_upload_bytes).await?;

                // browsers send an empty, unnamed part when no file was picked
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.image = Some(Attachment::new(filename, content_type, bytes));
            }
            Some("id") => form.id = Some(read_text(field).await?),
            Some("name") => form.name = Some(read_text(field).await?),
            Some("quantity") => form.quantity = Some(read_text(field).await?),
            _ => {}
        }
    }

    let record = state.orchestrator.create(form.into_request()).await?;
    info!(id = record.id, image = %record.image_reference, "record created");
    Ok(Redirect::to("/"))
}

/// Media types are case-insensitive; parameters such as `boundary` follow `;`.
fn is_multipart(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("multipart/form-data"))
}

/// Pull every `ids` / `ids[]` value out of a multipart or urlencoded body.
async fn collect_ids(req: Request, state: &AppState) -> Result<Vec<String>, AppError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let is_id_field = |name: &str| matches!(name, "ids" | "ids[]");

    let Some(content_type) = content_type else {
        // a bare POST carries no ids
        return Ok(Vec::new());
    };

    if is_multipart(&content_type) {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::new(rejection.status(), "BAD_MULTIPART", rejection.body_text())
            })?;
        let mut ids = Vec::new();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            if field.name().is_some_and(is_id_field) {
                ids.push(read_text(field).await?);
            }
        }
        Ok(ids)
    } else {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::new(rejection.status(), "BAD_FORM", rejection.body_text())
            })?;
        Ok(pairs
            .into_iter()
            .filter(|(name, _)| is_id_field(name.as_str()))
            .map(|(_, value)| value)
            .collect())
    }
}

/// `POST /delete`: delete every submitted id, then redirect to the listing.
///
/// Ids are deleted one at a time; on failure the response lists which ids
/// were deleted, which one failed and which were never attempted.
pub async fn delete_records(
    State(state): State<AppState>,
    req: Request,
) -> Result<Response, AppError> {
    let raw_ids = collect_ids(req, &state).await?;
    if raw_ids.is_empty() {
        return Ok(Redirect::to("/").into_response());
    }

    let ids = raw_ids
        .iter()
        .map(|raw| parse_id(raw).ok_or_else(|| AppError::bad_request(format!("invalid id `{raw}`"))))
        .collect::<Result<Vec<i64>, AppError>>()?;

    let outcome = state.orchestrator.delete_many(ids).await;
    if outcome.is_success() {
        return Ok(Redirect::to("/").into_response());
    }

    if let Some(failed) = &outcome.failed {
        error!(
            id = failed.id,
            error = %error_chain(&failed.error),
            deleted = ?outcome.deleted,
            not_attempted = ?outcome.not_attempted,
            "batch delete failed"
        );
    }
    let body = Json(json!({
        "error": "Internal Server Error",
        "code": "DELETE_ERROR",
        "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        "deleted": outcome.deleted,
        "failed": outcome.failed.as_ref().map(|failed| failed.id),
        "not_attempted": outcome.not_attempted,
    }));
    Ok((StatusCode::INTERNAL_SERVER_ERROR, body).into_response())
}
