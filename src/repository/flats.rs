use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{map_db_error, AppError};
use crate::models::Flat;

const FLAT_COLUMNS: &str = "id, owner_id, flat_number, floor, monthly_rent, created_at";

pub async fn create(
    pool: &PgPool,
    owner_id: Uuid,
    flat_number: &str,
    floor: i32,
    monthly_rent: Decimal,
) -> Result<Flat, AppError> {
    if number_taken(pool, owner_id, flat_number, None).await? {
        return Err(AppError::Conflict(format!(
            "Flat {flat_number} already exists in this portfolio."
        )));
    }

    sqlx::query_as::<_, Flat>(&format!(
        "INSERT INTO flats (owner_id, flat_number, floor, monthly_rent)
         VALUES ($1, $2, $3, $4)
         RETURNING {FLAT_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(flat_number)
    .bind(floor)
    .bind(monthly_rent)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Lookup without an owner scope; tenant reads resolve the flat through
/// their membership row instead.
pub async fn find(pool: &PgPool, flat_id: Uuid) -> Result<Flat, AppError> {
    sqlx::query_as::<_, Flat>(&format!("SELECT {FLAT_COLUMNS} FROM flats WHERE id = $1"))
        .bind(flat_id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Flat not found.".to_string()))
}

pub async fn list_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Flat>, AppError> {
    sqlx::query_as::<_, Flat>(&format!(
        "SELECT {FLAT_COLUMNS} FROM flats WHERE owner_id = $1 ORDER BY flat_number"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn update(
    pool: &PgPool,
    flat: &Flat,
    flat_number: &str,
    floor: i32,
    monthly_rent: Decimal,
) -> Result<Flat, AppError> {
    if flat_number != flat.flat_number
        && number_taken(pool, flat.owner_id, flat_number, Some(flat.id)).await?
    {
        return Err(AppError::Conflict(format!(
            "Flat {flat_number} already exists in this portfolio."
        )));
    }

    sqlx::query_as::<_, Flat>(&format!(
        "UPDATE flats SET flat_number = $2, floor = $3, monthly_rent = $4
         WHERE id = $1
         RETURNING {FLAT_COLUMNS}"
    ))
    .bind(flat.id)
    .bind(flat_number)
    .bind(floor)
    .bind(monthly_rent)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Counts removed alongside a flat deletion, reported back to the caller
/// so clients can show what went with the flat.
#[derive(Debug, Clone, Serialize)]
pub struct FlatDeletionStats {
    pub members_deleted: i64,
    pub rent_records_deleted: i64,
    pub payments_deleted: i64,
}

/// Deletes a flat; members, rent records and payments go with it via
/// foreign-key cascade.
pub async fn delete(pool: &PgPool, flat_id: Uuid) -> Result<FlatDeletionStats, AppError> {
    let (members, records, payments): (i64, i64, i64) = sqlx::query_as(
        "SELECT
            (SELECT COUNT(*) FROM flat_members WHERE flat_id = $1),
            (SELECT COUNT(*) FROM rent_records WHERE flat_id = $1),
            (SELECT COUNT(*) FROM payment_records p
             JOIN rent_records r ON r.id = p.rent_record_id
             WHERE r.flat_id = $1)",
    )
    .bind(flat_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)?;

    sqlx::query("DELETE FROM flats WHERE id = $1")
        .bind(flat_id)
        .execute(pool)
        .await
        .map_err(map_db_error)?;

    Ok(FlatDeletionStats {
        members_deleted: members,
        rent_records_deleted: records,
        payments_deleted: payments,
    })
}

async fn number_taken(
    pool: &PgPool,
    owner_id: Uuid,
    flat_number: &str,
    exclude: Option<Uuid>,
) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (
            SELECT 1 FROM flats
            WHERE owner_id = $1 AND flat_number = $2 AND ($3::uuid IS NULL OR id <> $3)
        )",
    )
    .bind(owner_id)
    .bind(flat_number)
    .bind(exclude)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}
