//! Ownership predicates threaded through every ledger operation.
//!
//! A lookup that exists but belongs to another owner reports *not found*,
//! never *forbidden*, so the API leaks nothing about other portfolios.

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{map_db_error, AppError};
use crate::models::{Flat, FlatMember, PaymentRecord, RentRecord, User};

/// Upserts the identity mirror row for a verified principal, refreshing the
/// email and display name the auth collaborator reports.
pub async fn ensure_app_user(pool: &PgPool, auth: &AuthUser) -> Result<User, AppError> {
    let email = auth.email.clone().unwrap_or_default();
    let full_name = auth
        .full_name
        .clone()
        .or_else(|| email.split('@').next().map(ToOwned::to_owned))
        .unwrap_or_default();

    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, full_name, role)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (id)
         DO UPDATE SET email = EXCLUDED.email, full_name = EXCLUDED.full_name
         RETURNING id, email, full_name, role, created_at",
    )
    .bind(auth.id)
    .bind(email)
    .bind(full_name)
    .bind(auth.role)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn owned_flat(pool: &PgPool, owner_id: Uuid, flat_id: Uuid) -> Result<Flat, AppError> {
    sqlx::query_as::<_, Flat>(
        "SELECT id, owner_id, flat_number, floor, monthly_rent, created_at
         FROM flats
         WHERE id = $1 AND owner_id = $2",
    )
    .bind(flat_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Flat not found.".to_string()))
}

pub async fn owned_rent_record(
    pool: &PgPool,
    owner_id: Uuid,
    record_id: Uuid,
) -> Result<RentRecord, AppError> {
    sqlx::query_as::<_, RentRecord>(
        "SELECT r.id, r.flat_id, r.month, r.monthly_rent, r.electricity_units,
                r.electricity_rate, r.created_at, r.updated_at
         FROM rent_records r
         JOIN flats f ON f.id = r.flat_id
         WHERE r.id = $1 AND f.owner_id = $2",
    )
    .bind(record_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Rent record not found.".to_string()))
}

pub async fn owned_payment(
    pool: &PgPool,
    owner_id: Uuid,
    payment_id: Uuid,
) -> Result<PaymentRecord, AppError> {
    sqlx::query_as::<_, PaymentRecord>(
        "SELECT p.id, p.rent_record_id, p.amount_received, p.payment_method,
                p.payment_by, p.payment_date, p.notes, p.created_at
         FROM payment_records p
         JOIN rent_records r ON r.id = p.rent_record_id
         JOIN flats f ON f.id = r.flat_id
         WHERE p.id = $1 AND f.owner_id = $2",
    )
    .bind(payment_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))
}

pub async fn owned_member(
    pool: &PgPool,
    owner_id: Uuid,
    member_id: Uuid,
) -> Result<FlatMember, AppError> {
    sqlx::query_as::<_, FlatMember>(
        "SELECT m.id, m.flat_id, m.user_id, m.full_name, m.phone_number, m.email,
                m.aadhar_number, m.pan_number, m.aadhar_document_url,
                m.pan_document_url, m.other_document_url, m.is_main_renter,
                m.notes, m.created_at
         FROM flat_members m
         JOIN flats f ON f.id = m.flat_id
         WHERE m.id = $1 AND f.owner_id = $2",
    )
    .bind(member_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Flat member not found.".to_string()))
}

/// Resolves a renter principal to their flat membership.
pub async fn membership_for_renter(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<FlatMember, AppError> {
    sqlx::query_as::<_, FlatMember>(
        "SELECT id, flat_id, user_id, full_name, phone_number, email,
                aadhar_number, pan_number, aadhar_document_url,
                pan_document_url, other_document_url, is_main_renter,
                notes, created_at
         FROM flat_members
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Flat member profile not found.".to_string()))
}
