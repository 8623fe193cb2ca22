use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::require_renter;
use crate::db::require_pool;
use crate::error::AppResult;
use crate::ownership::membership_for_renter;
use crate::repository::{flats, payments, rents};
use crate::services::ledger;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/tenant/rent-history",
        axum::routing::get(rent_history),
    )
}

/// Read-only ledger for the flat the renter belongs to. The renter never
/// names a flat id; the scope comes entirely from their membership row.
async fn rent_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_renter(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;

    let membership = membership_for_renter(pool, auth.id).await?;
    let flat = flats::find(pool, membership.flat_id).await?;

    let records = rents::list_for_flat(pool, flat.id).await?;
    let flat_payments = payments::list_for_flat(pool, flat.id).await?;

    let mut month_by_record = HashMap::new();
    for record in &records {
        month_by_record.insert(record.id, record.month);
    }

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

    let payment_rows = flat_payments
        .iter()
        .map(|payment| {
            json!({
                "payment": payment,
                "month": month_by_record.get(&payment.rent_record_id),
            })
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "flat": {
            "id": flat.id,
            "flat_number": flat.flat_number,
            "floor": flat.floor,
        },
        "membership": membership,
        "rent_records": views,
        "totals": totals,
        "payments": payment_rows,
    })))
}
