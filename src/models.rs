use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Principal role. Every access-control boundary matches on this
/// exhaustively; there is no third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Renter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Upi,
    Cheque,
    Online,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Cash
    }
}

/// Mirror of an identity issued by the external auth collaborator.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Flat {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub flat_number: String,
    pub floor: i32,
    pub monthly_rent: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FlatMember {
    pub id: Uuid,
    pub flat_id: Uuid,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub aadhar_number: String,
    pub pan_number: String,
    pub aadhar_document_url: Option<String>,
    pub pan_document_url: Option<String>,
    pub other_document_url: Option<String>,
    pub is_main_renter: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One calendar month's rent obligation. Only the inputs are stored; every
/// financial figure is re-derived from these plus the payment rows.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RentRecord {
    pub id: Uuid,
    pub flat_id: Uuid,
    pub month: NaiveDate,
    pub monthly_rent: Decimal,
    pub electricity_units: Decimal,
    pub electricity_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub rent_record_id: Uuid,
    pub amount_received: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_by: String,
    pub payment_date: DateTime<Utc>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}
