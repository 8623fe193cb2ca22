use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::PaymentMethod;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

/// Decimal fields sit outside validator's numeric ranges, so money inputs
/// are checked explicitly.
pub fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), AppError> {
    if value < Decimal::ZERO {
        return Err(AppError::UnprocessableEntity(format!(
            "{field} must not be negative."
        )));
    }
    Ok(())
}

fn default_false() -> bool {
    false
}

// ---- path params ----

#[derive(Debug, Clone, Deserialize)]
pub struct FlatPath {
    pub flat_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberPath {
    pub member_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RentRecordPath {
    pub record_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentPath {
    pub payment_id: Uuid,
}

// ---- flats ----

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateFlatInput {
    #[validate(length(min = 1, max = 10))]
    pub flat_number: String,
    #[validate(range(min = 0))]
    pub floor: i32,
    /// Defaults to the system-wide base rent when omitted.
    pub monthly_rent: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateFlatInput {
    #[validate(length(min = 1, max = 10))]
    pub flat_number: Option<String>,
    #[validate(range(min = 0))]
    pub floor: Option<i32>,
    pub monthly_rent: Option<Decimal>,
}

// ---- flat members ----

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMemberInput {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(min = 1, max = 15))]
    pub phone_number: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 12))]
    pub aadhar_number: String,
    #[validate(length(equal = 10))]
    pub pan_number: String,
    pub notes: Option<String>,
    #[serde(default = "default_false")]
    pub is_main_renter: bool,
    /// Address the auth collaborator invites for the main renter's login.
    /// Required when `is_main_renter` is set.
    #[validate(email)]
    pub login_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateMemberInput {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(min = 1, max = 15))]
    pub phone_number: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(equal = 12))]
    pub aadhar_number: Option<String>,
    #[validate(length(equal = 10))]
    pub pan_number: Option<String>,
    pub notes: Option<String>,
    pub is_main_renter: Option<bool>,
    #[validate(email)]
    pub login_email: Option<String>,
}

// ---- rent records ----

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRentRecordInput {
    /// Any day of the target month; normalized to the first.
    pub month: NaiveDate,
    /// Defaults to the flat's configured monthly rent.
    pub monthly_rent: Option<Decimal>,
    pub electricity_units: Option<Decimal>,
    pub electricity_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRentRecordInput {
    pub month: Option<NaiveDate>,
    pub monthly_rent: Option<Decimal>,
    pub electricity_units: Option<Decimal>,
    pub electricity_rate: Option<Decimal>,
}

// ---- payments ----

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePaymentInput {
    pub amount_received: Decimal,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, max = 100))]
    pub payment_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePaymentInput {
    pub amount_received: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(min = 1, max = 100))]
    pub payment_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeletePaymentsInput {
    pub payment_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_negative_money() {
        assert!(ensure_non_negative("monthly_rent", dec!(-1)).is_err());
        assert!(ensure_non_negative("monthly_rent", Decimal::ZERO).is_ok());
    }

    #[test]
    fn flat_input_validates_floor_and_number() {
        let bad = CreateFlatInput {
            flat_number: String::new(),
            floor: -1,
            monthly_rent: None,
        };
        assert!(validate_input(&bad).is_err());

        let good = CreateFlatInput {
            flat_number: "A-101".to_string(),
            floor: 1,
            monthly_rent: Some(dec!(6000)),
        };
        assert!(validate_input(&good).is_ok());
    }

    #[test]
    fn member_input_checks_document_number_lengths() {
        let bad = CreateMemberInput {
            full_name: "Ravi Kumar".to_string(),
            phone_number: "9876543210".to_string(),
            email: "ravi@example.com".to_string(),
            aadhar_number: "123".to_string(),
            pan_number: "ABCDE1234F".to_string(),
            notes: None,
            is_main_renter: false,
            login_email: None,
        };
        assert!(validate_input(&bad).is_err());
    }
}
