use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_owner;
use crate::db::require_pool;
use crate::error::{AppError, AppResult};
use crate::ownership::owned_member;
use crate::repository::members::{self, DocumentKind};
use crate::schemas::MemberPath;
use crate::services::storage;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/members/{member_id}/documents",
        axum::routing::get(list_documents).post(upload_document),
    )
}

async fn list_documents(
    State(state): State<AppState>,
    Path(path): Path<MemberPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let member = owned_member(pool, auth.id, path.member_id).await?;
    Ok(Json(json!({
        "aadhar_document_url": member.aadhar_document_url,
        "pan_document_url": member.pan_document_url,
        "other_document_url": member.other_document_url,
    })))
}

/// Multipart upload: a `kind` text field (aadhar, pan or other) and a `file`
/// part. The stored URL lands on the matching member column.
async fn upload_document(
    State(state): State<AppState>,
    Path(path): Path<MemberPath>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let member = owned_member(pool, auth.id, path.member_id).await?;

    let mut kind: Option<DocumentKind> = None;
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("Invalid multipart body: {err}")))?
    {
        match field.name() {
            Some("kind") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|err| AppError::BadRequest(format!("Invalid kind field: {err}")))?;
                kind = Some(DocumentKind::parse(&raw)?);
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .unwrap_or("document")
                    .to_string();
                let content_type = field.content_type().map(ToOwned::to_owned);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(format!("Invalid file field: {err}")))?;
                if bytes.len() > state.config.max_upload_bytes {
                    return Err(AppError::UnprocessableEntity(format!(
                        "File exceeds the {} byte upload limit.",
                        state.config.max_upload_bytes
                    )));
                }
                file = Some((file_name, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| {
        AppError::BadRequest("Missing 'kind' field (aadhar, pan or other).".to_string())
    })?;
    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::BadRequest("Missing 'file' field.".to_string()))?;

    let stored = storage::upload_member_document(
        &state,
        member.id,
        kind,
        &file_name,
        content_type.as_deref(),
        bytes,
    )
    .await?;
    let updated = members::set_document_url(pool, member.id, kind, &stored.url).await?;

    tracing::info!(member_id = %member.id, kind = kind.as_str(), "Member document stored");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "member": updated, "document": stored })),
    ))
}
