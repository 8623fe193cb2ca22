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
use crate::ownership::{owned_flat, owned_rent_record};
use crate::repository::{payments, rents};
use crate::schemas::{
    ensure_non_negative, CreateRentRecordInput, FlatPath, RentRecordPath, UpdateRentRecordInput,
};
use crate::services::ledger;
use crate::state::AppState;

/// Default electricity tariff in currency units per metered unit.
fn default_electricity_rate() -> Decimal {
    Decimal::from(8)
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/flats/{flat_id}/rent-records",
            axum::routing::get(list_rent_records).post(create_rent_record),
        )
        .route(
            "/rent-records/{record_id}",
            axum::routing::get(get_rent_record)
                .put(update_rent_record)
                .delete(delete_rent_record),
        )
}

async fn list_rent_records(
    State(state): State<AppState>,
    Path(path): Path<FlatPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let flat = owned_flat(pool, auth.id, path.flat_id).await?;

    let records = rents::list_for_flat(pool, flat.id).await?;
    let flat_payments = payments::list_for_flat(pool, flat.id).await?;

    let mut by_record: HashMap<_, Vec<_>> = HashMap::new();
    for payment in flat_payments {
        by_record
            .entry(payment.rent_record_id)
            .or_default()
            .push(payment);
    }

    let views = records
        .into_iter()
        .map(|record| {
            let record_payments = by_record.remove(&record.id).unwrap_or_default();
            ledger::derive(record, &record_payments)
        })
        .collect::<Vec<_>>();
    let totals = ledger::summarize(&views);

    Ok(Json(json!({ "data": views, "totals": totals })))
}

async fn create_rent_record(
    State(state): State<AppState>,
    Path(path): Path<FlatPath>,
    headers: HeaderMap,
    Json(payload): Json<CreateRentRecordInput>,
) -> AppResult<impl IntoResponse> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let flat = owned_flat(pool, auth.id, path.flat_id).await?;

    let month = ledger::normalize_month(payload.month);
    let monthly_rent = payload.monthly_rent.unwrap_or(flat.monthly_rent);
    let electricity_units = payload.electricity_units.unwrap_or(Decimal::ZERO);
    let electricity_rate = payload
        .electricity_rate
        .unwrap_or_else(default_electricity_rate);
    ensure_non_negative("monthly_rent", monthly_rent)?;
    ensure_non_negative("electricity_units", electricity_units)?;
    ensure_non_negative("electricity_rate", electricity_rate)?;

    let record = rents::create(
        pool,
        flat.id,
        month,
        monthly_rent,
        electricity_units,
        electricity_rate,
    )
    .await?;

    tracing::info!(record_id = %record.id, flat_id = %flat.id, month = %record.month, "Rent record created");
    Ok((StatusCode::CREATED, Json(ledger::derive(record, &[]))))
}

async fn get_rent_record(
    State(state): State<AppState>,
    Path(path): Path<RentRecordPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let record = owned_rent_record(pool, auth.id, path.record_id).await?;

    let record_payments = payments::list_for_record(pool, record.id).await?;
    let view = ledger::derive(record, &record_payments);
    Ok(Json(json!({ "rent_record": view, "payments": record_payments })))
}

async fn update_rent_record(
    State(state): State<AppState>,
    Path(path): Path<RentRecordPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateRentRecordInput>,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let record = owned_rent_record(pool, auth.id, path.record_id).await?;

    let month = payload
        .month
        .map(ledger::normalize_month)
        .unwrap_or(record.month);
    let monthly_rent = payload.monthly_rent.unwrap_or(record.monthly_rent);
    let electricity_units = payload.electricity_units.unwrap_or(record.electricity_units);
    let electricity_rate = payload.electricity_rate.unwrap_or(record.electricity_rate);
    ensure_non_negative("monthly_rent", monthly_rent)?;
    ensure_non_negative("electricity_units", electricity_units)?;
    ensure_non_negative("electricity_rate", electricity_rate)?;

    let updated = rents::update(
        pool,
        &record,
        month,
        monthly_rent,
        electricity_units,
        electricity_rate,
    )
    .await?;

    let record_payments = payments::list_for_record(pool, updated.id).await?;
    let view = ledger::derive(updated, &record_payments);
    Ok(Json(json!({ "rent_record": view })))
}

async fn delete_rent_record(
    State(state): State<AppState>,
    Path(path): Path<RentRecordPath>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let record = owned_rent_record(pool, auth.id, path.record_id).await?;
    rents::delete_guarded(pool, record.id).await?;
    tracing::info!(record_id = %record.id, "Rent record deleted");
    Ok(StatusCode::NO_CONTENT)
}
