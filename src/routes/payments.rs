use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_owner;
use crate::db::require_pool;
use crate::error::AppResult;
use crate::ownership::{owned_payment, owned_rent_record};
use crate::repository::payments;
use crate::schemas::{
    validate_input, BulkDeletePaymentsInput, CreatePaymentInput, PaymentPath, RentRecordPath,
    UpdatePaymentInput,
};
use crate::services::ledger;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/rent-records/{record_id}/payments",
            axum::routing::get(list_payments).post(create_payment),
        )
        .route(
            "/rent-records/{record_id}/duplicate-payments",
            axum::routing::get(list_duplicate_payments),
        )
        .route(
            "/rent-records/{record_id}/payments/bulk-delete",
            axum::routing::post(bulk_delete_payments),
        )
        .route(
            "/payments/{payment_id}",
            axum::routing::put(update_payment).delete(delete_payment),
        )
}

async fn list_payments(
    State(state): State<AppState>,
    Path(path): Path<RentRecordPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let record = owned_rent_record(pool, auth.id, path.record_id).await?;

    let record_payments = payments::list_for_record(pool, record.id).await?;
    let duplicates = ledger::detect_duplicates(&record_payments);
    let view = ledger::derive(record, &record_payments);

    Ok(Json(json!({
        "rent_record": view,
        "data": record_payments,
        "duplicate_warnings": duplicates,
    })))
}

async fn create_payment(
    State(state): State<AppState>,
    Path(path): Path<RentRecordPath>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentInput>,
) -> AppResult<impl IntoResponse> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    validate_input(&payload)?;

    let record = owned_rent_record(pool, auth.id, path.record_id).await?;
    let payment = payments::insert_guarded(
        pool,
        record.id,
        payload.amount_received,
        payload.payment_method,
        payload.payment_by.trim(),
        payload.notes.as_deref().unwrap_or(""),
    )
    .await?;

    tracing::info!(
        payment_id = %payment.id,
        record_id = %record.id,
        amount = %payment.amount_received,
        "Payment recorded"
    );
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn list_duplicate_payments(
    State(state): State<AppState>,
    Path(path): Path<RentRecordPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let record = owned_rent_record(pool, auth.id, path.record_id).await?;

    let record_payments = payments::list_for_record(pool, record.id).await?;
    let duplicates = ledger::detect_duplicates(&record_payments);
    Ok(Json(json!({ "data": duplicates })))
}

async fn bulk_delete_payments(
    State(state): State<AppState>,
    Path(path): Path<RentRecordPath>,
    headers: HeaderMap,
    Json(payload): Json<BulkDeletePaymentsInput>,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let record = owned_rent_record(pool, auth.id, path.record_id).await?;

    let deleted = payments::delete_many(pool, record.id, &payload.payment_ids).await?;
    tracing::info!(record_id = %record.id, deleted, "Payments bulk-deleted");
    Ok(Json(json!({ "deleted": deleted })))
}

async fn update_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdatePaymentInput>,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    validate_input(&payload)?;

    let payment = owned_payment(pool, auth.id, path.payment_id).await?;
    let amount = payload.amount_received.unwrap_or(payment.amount_received);
    let method = payload.payment_method.unwrap_or(payment.payment_method);
    let payment_by = payload
        .payment_by
        .as_deref()
        .map(str::trim)
        .unwrap_or(&payment.payment_by)
        .to_string();
    let notes = payload.notes.as_deref().unwrap_or(&payment.notes).to_string();

    let updated = payments::update_guarded(pool, &payment, amount, method, &payment_by, &notes).await?;
    Ok(Json(json!({ "payment": updated })))
}

async fn delete_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let payment = owned_payment(pool, auth.id, path.payment_id).await?;
    payments::delete(pool, payment.id).await?;
    tracing::info!(payment_id = %payment.id, "Payment deleted");
    Ok(StatusCode::NO_CONTENT)
}
