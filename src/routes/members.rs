use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_owner;
use crate::db::require_pool;
use crate::error::AppResult;
use crate::ownership::{owned_flat, owned_member};
use crate::repository::members;
use crate::schemas::{validate_input, CreateMemberInput, FlatPath, MemberPath, UpdateMemberInput};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/flats/{flat_id}/members",
            axum::routing::get(list_members).post(create_member),
        )
        .route(
            "/members/{member_id}",
            axum::routing::get(get_member)
                .put(update_member)
                .delete(delete_member),
        )
}

async fn list_members(
    State(state): State<AppState>,
    Path(path): Path<FlatPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let flat = owned_flat(pool, auth.id, path.flat_id).await?;
    let members = members::list_for_flat(pool, flat.id).await?;
    Ok(Json(json!({ "data": members })))
}

async fn create_member(
    State(state): State<AppState>,
    Path(path): Path<FlatPath>,
    headers: HeaderMap,
    Json(payload): Json<CreateMemberInput>,
) -> AppResult<impl IntoResponse> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    validate_input(&payload)?;

    let flat = owned_flat(pool, auth.id, path.flat_id).await?;
    let member = members::create(pool, flat.id, &payload).await?;

    tracing::info!(
        member_id = %member.id,
        flat_id = %flat.id,
        main_renter = member.is_main_renter,
        "Flat member added"
    );
    Ok((StatusCode::CREATED, Json(member)))
}

async fn get_member(
    State(state): State<AppState>,
    Path(path): Path<MemberPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let member = owned_member(pool, auth.id, path.member_id).await?;
    Ok(Json(json!({ "member": member })))
}

async fn update_member(
    State(state): State<AppState>,
    Path(path): Path<MemberPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateMemberInput>,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    validate_input(&payload)?;

    let member = owned_member(pool, auth.id, path.member_id).await?;
    let updated = members::update(pool, &member, &payload).await?;
    Ok(Json(json!({ "member": updated })))
}

async fn delete_member(
    State(state): State<AppState>,
    Path(path): Path<MemberPath>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let member = owned_member(pool, auth.id, path.member_id).await?;
    members::delete(pool, &member).await?;
    tracing::info!(member_id = %member.id, "Flat member removed");
    Ok(StatusCode::NO_CONTENT)
}
