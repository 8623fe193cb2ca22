use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{map_db_error, AppError};
use crate::models::RentRecord;
use crate::services::ledger;

const RENT_COLUMNS: &str = "id, flat_id, month, monthly_rent, electricity_units, \
     electricity_rate, created_at, updated_at";

pub async fn list_for_flat(pool: &PgPool, flat_id: Uuid) -> Result<Vec<RentRecord>, AppError> {
    sqlx::query_as::<_, RentRecord>(&format!(
        "SELECT {RENT_COLUMNS} FROM rent_records WHERE flat_id = $1 ORDER BY month DESC"
    ))
    .bind(flat_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn list_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<RentRecord>, AppError> {
    sqlx::query_as::<_, RentRecord>(&format!(
        "SELECT r.{} FROM rent_records r
         JOIN flats f ON f.id = r.flat_id
         WHERE f.owner_id = $1
         ORDER BY r.month DESC",
        RENT_COLUMNS.replace(", ", ", r.")
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn create(
    pool: &PgPool,
    flat_id: Uuid,
    month: NaiveDate,
    monthly_rent: Decimal,
    electricity_units: Decimal,
    electricity_rate: Decimal,
) -> Result<RentRecord, AppError> {
    if month_taken(pool, flat_id, month, None).await? {
        return Err(AppError::Conflict(format!(
            "A rent record for {} already exists for this flat.",
            month.format("%B %Y")
        )));
    }

    sqlx::query_as::<_, RentRecord>(&format!(
        "INSERT INTO rent_records
            (flat_id, month, monthly_rent, electricity_units, electricity_rate)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {RENT_COLUMNS}"
    ))
    .bind(flat_id)
    .bind(month)
    .bind(monthly_rent)
    .bind(electricity_units)
    .bind(electricity_rate)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn update(
    pool: &PgPool,
    record: &RentRecord,
    month: NaiveDate,
    monthly_rent: Decimal,
    electricity_units: Decimal,
    electricity_rate: Decimal,
) -> Result<RentRecord, AppError> {
    if month != record.month && month_taken(pool, record.flat_id, month, Some(record.id)).await? {
        return Err(AppError::Conflict(format!(
            "A rent record for {} already exists for this flat.",
            month.format("%B %Y")
        )));
    }

    sqlx::query_as::<_, RentRecord>(&format!(
        "UPDATE rent_records
         SET month = $2, monthly_rent = $3, electricity_units = $4,
             electricity_rate = $5, updated_at = now()
         WHERE id = $1
         RETURNING {RENT_COLUMNS}"
    ))
    .bind(record.id)
    .bind(month)
    .bind(monthly_rent)
    .bind(electricity_units)
    .bind(electricity_rate)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Deletion is blocked while payments reference the record, so payment
/// history can never vanish as a side effect. Callers must delete the
/// payments explicitly first. The count and the delete run under the same
/// record row lock the payment writers take, so a payment landing
/// concurrently either blocks this delete or is counted by it.
pub async fn delete_guarded(pool: &PgPool, record_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let locked: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM rent_records WHERE id = $1 FOR UPDATE")
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?;
    if locked.is_none() {
        return Err(AppError::NotFound("Rent record not found.".to_string()));
    }

    let payments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payment_records WHERE rent_record_id = $1")
            .bind(record_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;
    ledger::ensure_no_dependent_payments(payments)?;

    sqlx::query("DELETE FROM rent_records WHERE id = $1")
        .bind(record_id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

    tx.commit().await.map_err(map_db_error)
}

async fn month_taken(
    pool: &PgPool,
    flat_id: Uuid,
    month: NaiveDate,
    exclude: Option<Uuid>,
) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (
            SELECT 1 FROM rent_records
            WHERE flat_id = $1 AND month = $2 AND ($3::uuid IS NULL OR id <> $3)
        )",
    )
    .bind(flat_id)
    .bind(month)
    .bind(exclude)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}
