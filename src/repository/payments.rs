use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{map_db_error, AppError};
use crate::models::{PaymentMethod, PaymentRecord, RentRecord};
use crate::services::ledger;

const PAYMENT_COLUMNS: &str = "id, rent_record_id, amount_received, payment_method, \
     payment_by, payment_date, notes, created_at";

pub async fn list_for_record(
    pool: &PgPool,
    record_id: Uuid,
) -> Result<Vec<PaymentRecord>, AppError> {
    sqlx::query_as::<_, PaymentRecord>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment_records
         WHERE rent_record_id = $1
         ORDER BY payment_date DESC"
    ))
    .bind(record_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

/// All payments under a flat, newest first, for ledger views that flatten
/// across months.
pub async fn list_for_flat(pool: &PgPool, flat_id: Uuid) -> Result<Vec<PaymentRecord>, AppError> {
    sqlx::query_as::<_, PaymentRecord>(&format!(
        "SELECT p.{} FROM payment_records p
         JOIN rent_records r ON r.id = p.rent_record_id
         WHERE r.flat_id = $1
         ORDER BY p.payment_date DESC",
        PAYMENT_COLUMNS.replace(", ", ", p.")
    ))
    .bind(flat_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn list_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<PaymentRecord>, AppError> {
    sqlx::query_as::<_, PaymentRecord>(&format!(
        "SELECT p.{} FROM payment_records p
         JOIN rent_records r ON r.id = p.rent_record_id
         JOIN flats f ON f.id = r.flat_id
         WHERE f.owner_id = $1
         ORDER BY p.payment_date DESC",
        PAYMENT_COLUMNS.replace(", ", ", p.")
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

/// Appends a payment after re-checking the remaining due under a row lock
/// on the rent record, so concurrent submissions serialize instead of both
/// racing past the cap.
pub async fn insert_guarded(
    pool: &PgPool,
    record_id: Uuid,
    amount: Decimal,
    method: PaymentMethod,
    payment_by: &str,
    notes: &str,
) -> Result<PaymentRecord, AppError> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let record = lock_rent_record(&mut tx, record_id).await?;
    let received = received_sum(&mut tx, record_id, None).await?;
    let remaining = ledger::total_rent(&record) - received;
    ledger::check_payment_amount(amount, remaining)?;

    let payment = sqlx::query_as::<_, PaymentRecord>(&format!(
        "INSERT INTO payment_records
            (rent_record_id, amount_received, payment_method, payment_by, notes)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(record_id)
    .bind(amount)
    .bind(method)
    .bind(payment_by)
    .bind(notes)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_db_error)?;

    tx.commit().await.map_err(map_db_error)?;
    Ok(payment)
}

/// Same cap check as `insert_guarded`, with the edited payment excluded
/// from the already-received sum.
pub async fn update_guarded(
    pool: &PgPool,
    payment: &PaymentRecord,
    amount: Decimal,
    method: PaymentMethod,
    payment_by: &str,
    notes: &str,
) -> Result<PaymentRecord, AppError> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let record = lock_rent_record(&mut tx, payment.rent_record_id).await?;
    let received = received_sum(&mut tx, payment.rent_record_id, Some(payment.id)).await?;
    let remaining = ledger::total_rent(&record) - received;
    ledger::check_payment_amount(amount, remaining)?;

    let updated = sqlx::query_as::<_, PaymentRecord>(&format!(
        "UPDATE payment_records
         SET amount_received = $2, payment_method = $3, payment_by = $4, notes = $5
         WHERE id = $1
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(payment.id)
    .bind(amount)
    .bind(method)
    .bind(payment_by)
    .bind(notes)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_db_error)?;

    tx.commit().await.map_err(map_db_error)?;
    Ok(updated)
}

pub async fn delete(pool: &PgPool, payment_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM payment_records WHERE id = $1")
        .bind(payment_id)
        .execute(pool)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

/// Deletes an explicit id list scoped to one rent record (the duplicate
/// cleanup flow). Ids under other records are ignored, not errors.
pub async fn delete_many(
    pool: &PgPool,
    record_id: Uuid,
    payment_ids: &[Uuid],
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM payment_records WHERE rent_record_id = $1 AND id = ANY($2)",
    )
    .bind(record_id)
    .bind(payment_ids)
    .execute(pool)
    .await
    .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

async fn lock_rent_record(
    tx: &mut PgConnection,
    record_id: Uuid,
) -> Result<RentRecord, AppError> {
    sqlx::query_as::<_, RentRecord>(
        "SELECT id, flat_id, month, monthly_rent, electricity_units,
                electricity_rate, created_at, updated_at
         FROM rent_records
         WHERE id = $1
         FOR UPDATE",
    )
    .bind(record_id)
    .fetch_optional(tx)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Rent record not found.".to_string()))
}

async fn received_sum(
    tx: &mut PgConnection,
    record_id: Uuid,
    exclude: Option<Uuid>,
) -> Result<Decimal, AppError> {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(amount_received), 0)
         FROM payment_records
         WHERE rent_record_id = $1 AND ($2::uuid IS NULL OR id <> $2)",
    )
    .bind(record_id)
    .bind(exclude)
    .fetch_one(tx)
    .await
    .map_err(map_db_error)
}
