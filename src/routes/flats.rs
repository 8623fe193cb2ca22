use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::require_owner;
use crate::db::require_pool;
use crate::error::AppResult;
use crate::ownership::{ensure_app_user, owned_flat};
use crate::repository::{flats, members, payments, rents};
use crate::schemas::{ensure_non_negative, validate_input, CreateFlatInput, FlatPath, UpdateFlatInput};
use crate::services::ledger;
use crate::state::AppState;

/// Base rent applied when a flat is registered without one.
fn default_monthly_rent() -> Decimal {
    Decimal::from(6000)
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/flats",
            axum::routing::get(list_flats).post(create_flat),
        )
        .route(
            "/flats/{flat_id}",
            axum::routing::get(get_flat)
                .put(update_flat)
                .delete(delete_flat),
        )
}

async fn create_flat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateFlatInput>,
) -> AppResult<impl IntoResponse> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    validate_input(&payload)?;

    let monthly_rent = payload.monthly_rent.unwrap_or_else(default_monthly_rent);
    ensure_non_negative("monthly_rent", monthly_rent)?;

    // The owner row must exist before the FK insert; mirrors lazily.
    ensure_app_user(pool, &auth).await?;

    let flat = flats::create(
        pool,
        auth.id,
        payload.flat_number.trim(),
        payload.floor,
        monthly_rent,
    )
    .await?;

    tracing::info!(flat_id = %flat.id, flat_number = %flat.flat_number, "Flat created");
    Ok((StatusCode::CREATED, Json(flat)))
}

async fn list_flats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let flats = flats::list_for_owner(pool, auth.id).await?;
    Ok(Json(json!({ "data": flats })))
}

/// Flat detail: members, per-month ledger views with derived fields, the
/// flat-level rollup and the most recent payments.
async fn get_flat(
    State(state): State<AppState>,
    Path(path): Path<FlatPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let flat = owned_flat(pool, auth.id, path.flat_id).await?;

    let members = members::list_for_flat(pool, flat.id).await?;
    let records = rents::list_for_flat(pool, flat.id).await?;
    let flat_payments = payments::list_for_flat(pool, flat.id).await?;

    let mut by_record: HashMap<_, Vec<_>> = HashMap::new();
    for payment in &flat_payments {
        by_record
            .entry(payment.rent_record_id)
            .or_default()
            .push(payment.clone());
    }

    let views = records
        .into_iter()
        .map(|record| {
            let record_payments = by_record.remove(&record.id).unwrap_or_default();
            ledger::derive(record, &record_payments)
        })
        .collect::<Vec<_>>();
    let totals = ledger::summarize(&views);
    let recent_payments = flat_payments.iter().take(10).collect::<Vec<_>>();

    Ok(Json(json!({
        "flat": flat,
        "members": members,
        "rent_records": views,
        "totals": totals,
        "recent_payments": recent_payments,
    })))
}

async fn update_flat(
    State(state): State<AppState>,
    Path(path): Path<FlatPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateFlatInput>,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    validate_input(&payload)?;

    let flat = owned_flat(pool, auth.id, path.flat_id).await?;

    let flat_number = payload
        .flat_number
        .as_deref()
        .map(str::trim)
        .unwrap_or(&flat.flat_number)
        .to_string();
    let floor = payload.floor.unwrap_or(flat.floor);
    let monthly_rent = payload.monthly_rent.unwrap_or(flat.monthly_rent);
    ensure_non_negative("monthly_rent", monthly_rent)?;

    let updated = flats::update(pool, &flat, &flat_number, floor, monthly_rent).await?;
    Ok(Json(json!({ "flat": updated })))
}

async fn delete_flat(
    State(state): State<AppState>,
    Path(path): Path<FlatPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let flat = owned_flat(pool, auth.id, path.flat_id).await?;

    let stats = flats::delete(pool, flat.id).await?;
    tracing::info!(
        flat_id = %flat.id,
        members = stats.members_deleted,
        rent_records = stats.rent_records_deleted,
        payments = stats.payments_deleted,
        "Flat deleted with dependents"
    );
    Ok(Json(json!({ "deleted": true, "stats": stats })))
}
