use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::require_owner;
use crate::db::require_pool;
use crate::error::AppResult;
use crate::models::{Flat, PaymentRecord, RentRecord};
use crate::ownership::owned_flat;
use crate::repository::{flats, members, payments, rents};
use crate::schemas::FlatPath;
use crate::services::ledger::{self, LedgerTotals, RentRecordView};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/reports/portfolio-summary",
            axum::routing::get(portfolio_summary),
        )
        .route(
            "/reports/flats/{flat_id}/summary",
            axum::routing::get(flat_summary),
        )
}

/// Per-flat ledger rollup for a breakdown row.
struct FlatLedger {
    totals: LedgerTotals,
    last_payment_date: Option<DateTime<Utc>>,
}

fn ledger_by_flat(
    records: Vec<RentRecord>,
    flat_payments: Vec<PaymentRecord>,
) -> HashMap<Uuid, FlatLedger> {
    let mut payments_by_record: HashMap<Uuid, Vec<PaymentRecord>> = HashMap::new();
    for payment in flat_payments {
        payments_by_record
            .entry(payment.rent_record_id)
            .or_default()
            .push(payment);
    }

    let mut ledgers: HashMap<Uuid, FlatLedger> = HashMap::new();
    for record in records {
        let flat_id = record.flat_id;
        let record_payments = payments_by_record.remove(&record.id).unwrap_or_default();
        let latest = record_payments
            .iter()
            .map(|payment| payment.payment_date)
            .max();
        let view = ledger::derive(record, &record_payments);

        let entry = ledgers.entry(flat_id).or_insert_with(|| FlatLedger {
            totals: LedgerTotals::default(),
            last_payment_date: None,
        });
        entry.totals.accumulate(&view);
        if latest > entry.last_payment_date {
            entry.last_payment_date = latest;
        }
    }
    ledgers
}

fn breakdown_row(flat: &Flat, ledger: Option<&FlatLedger>, member_count: i64) -> Value {
    let empty = LedgerTotals::default();
    let totals = ledger.map(|l| &l.totals).unwrap_or(&empty);
    json!({
        "flat_id": flat.id,
        "flat_number": flat.flat_number,
        "floor": flat.floor,
        "monthly_rent": flat.monthly_rent,
        "member_count": member_count,
        "occupied": member_count > 0,
        "totals": totals,
        "payment_status": totals.status(),
        "last_payment_date": ledger.and_then(|l| l.last_payment_date),
    })
}

/// Portfolio-wide rollup: grand totals across every flat the owner holds,
/// occupancy counts and a per-flat breakdown.
async fn portfolio_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;

    let owner_flats = flats::list_for_owner(pool, auth.id).await?;
    let records = rents::list_for_owner(pool, auth.id).await?;
    let owner_payments = payments::list_for_owner(pool, auth.id).await?;
    let member_counts: HashMap<Uuid, i64> = members::counts_for_owner(pool, auth.id)
        .await?
        .into_iter()
        .collect();

    let ledgers = ledger_by_flat(records, owner_payments);

    let mut grand = LedgerTotals::default();
    for flat_ledger in ledgers.values() {
        grand.merge(&flat_ledger.totals);
    }

    let occupied = owner_flats
        .iter()
        .filter(|flat| member_counts.get(&flat.id).copied().unwrap_or(0) > 0)
        .count();
    let configured_rent: Decimal = owner_flats.iter().map(|flat| flat.monthly_rent).sum();

    let breakdown = owner_flats
        .iter()
        .map(|flat| {
            breakdown_row(
                flat,
                ledgers.get(&flat.id),
                member_counts.get(&flat.id).copied().unwrap_or(0),
            )
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "flat_count": owner_flats.len(),
        "occupied_flats": occupied,
        "vacant_flats": owner_flats.len() - occupied,
        "total_configured_rent": configured_rent,
        "totals": grand,
        "flats": breakdown,
    })))
}

/// All-time rollup for a single flat with its month-by-month ledger.
async fn flat_summary(
    State(state): State<AppState>,
    Path(path): Path<FlatPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let auth = require_owner(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let flat = owned_flat(pool, auth.id, path.flat_id).await?;

    let records = rents::list_for_flat(pool, flat.id).await?;
    let flat_payments = payments::list_for_flat(pool, flat.id).await?;
    let flat_members = members::list_for_flat(pool, flat.id).await?;

    let mut payments_by_record: HashMap<Uuid, Vec<PaymentRecord>> = HashMap::new();
    for payment in flat_payments {
        payments_by_record
            .entry(payment.rent_record_id)
            .or_default()
            .push(payment);
    }

    let mut last_payment_date: Option<DateTime<Utc>> = None;
    let views: Vec<RentRecordView> = records
        .into_iter()
        .map(|record| {
            let record_payments = payments_by_record.remove(&record.id).unwrap_or_default();
            let latest = record_payments
                .iter()
                .map(|payment| payment.payment_date)
                .max();
            if latest > last_payment_date {
                last_payment_date = latest;
            }
            ledger::derive(record, &record_payments)
        })
        .collect();
    let totals = ledger::summarize(&views);

    Ok(Json(json!({
        "flat": flat,
        "member_count": flat_members.len(),
        "occupied": !flat_members.is_empty(),
        "totals": totals,
        "payment_status": totals.status(),
        "last_payment_date": last_payment_date,
        "months": views,
    })))
}
