//! Pure rent/payment arithmetic.
//!
//! Every derived financial figure in the system is computed here from stored
//! inputs alone. Nothing in this module touches the store or caches results,
//! so reading a record's derived fields twice without intervening writes
//! always yields identical values.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{PaymentRecord, RentRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

/// A rent record with its derived fields, the shape read endpoints return.
#[derive(Debug, Clone, Serialize)]
pub struct RentRecordView {
    #[serde(flatten)]
    pub record: RentRecord,
    pub electricity_bill: Decimal,
    pub total_rent: Decimal,
    pub total_received: Decimal,
    pub remaining_rent: Decimal,
    pub is_fully_paid: bool,
    pub payment_status: PaymentStatus,
}

pub fn electricity_bill(units: Decimal, rate: Decimal) -> Decimal {
    units * rate
}

pub fn total_rent(record: &RentRecord) -> Decimal {
    record.monthly_rent + electricity_bill(record.electricity_units, record.electricity_rate)
}

pub fn total_received(payments: &[PaymentRecord]) -> Decimal {
    payments
        .iter()
        .map(|payment| payment.amount_received)
        .sum()
}

/// Paid wins over partial when received overshoots the due amount; the three
/// outcomes are mutually exclusive and exhaustive for non-negative dues.
pub fn classify(total_rent: Decimal, total_received: Decimal) -> PaymentStatus {
    if total_rent - total_received <= Decimal::ZERO {
        PaymentStatus::Paid
    } else if total_received > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

pub fn derive(record: RentRecord, payments: &[PaymentRecord]) -> RentRecordView {
    let bill = electricity_bill(record.electricity_units, record.electricity_rate);
    let total = record.monthly_rent + bill;
    let received = total_received(payments);
    let remaining = total - received;
    RentRecordView {
        electricity_bill: bill,
        total_rent: total,
        total_received: received,
        remaining_rent: remaining,
        is_fully_paid: remaining <= Decimal::ZERO,
        payment_status: classify(total, received),
        record,
    }
}

/// Rejects non-positive amounts and amounts exceeding the remaining due.
/// `remaining` is the caller's view at the moment of the check; callers hold
/// a row lock on the rent record so the view cannot go stale mid-insert.
pub fn check_payment_amount(amount: Decimal, remaining: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::UnprocessableEntity(
            "Amount received must be greater than 0.".to_string(),
        ));
    }
    if amount > remaining {
        return Err(AppError::Overpayment(format!(
            "Amount received cannot exceed remaining rent of {remaining}."
        )));
    }
    Ok(())
}

/// Rent record deletion is refused while payments reference it, so payment
/// history never vanishes through the delete cascade.
pub fn ensure_no_dependent_payments(payment_count: i64) -> Result<(), AppError> {
    if payment_count > 0 {
        return Err(AppError::HasDependentPayments(format!(
            "Cannot delete rent record: it has {payment_count} payment(s). Delete the payments first."
        )));
    }
    Ok(())
}

/// Ledger month marker: any date collapses to the first of its month.
pub fn normalize_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Rollup across a set of rent records (one flat, or a whole portfolio).
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerTotals {
    pub record_count: i64,
    pub total_rent: Decimal,
    pub total_received: Decimal,
    pub total_pending: Decimal,
    pub paid_records: i64,
    pub partial_records: i64,
    pub unpaid_records: i64,
}

impl LedgerTotals {
    pub fn accumulate(&mut self, view: &RentRecordView) {
        self.record_count += 1;
        self.total_rent += view.total_rent;
        self.total_received += view.total_received;
        self.total_pending += view.remaining_rent;
        match view.payment_status {
            PaymentStatus::Paid => self.paid_records += 1,
            PaymentStatus::Partial => self.partial_records += 1,
            PaymentStatus::Unpaid => self.unpaid_records += 1,
        }
    }

    pub fn merge(&mut self, other: &LedgerTotals) {
        self.record_count += other.record_count;
        self.total_rent += other.total_rent;
        self.total_received += other.total_received;
        self.total_pending += other.total_pending;
        self.paid_records += other.paid_records;
        self.partial_records += other.partial_records;
        self.unpaid_records += other.unpaid_records;
    }

    /// Flat-level status applies the three-way classification to the summed
    /// totals, not per record: one paid and one unpaid month reads as partial.
    pub fn status(&self) -> PaymentStatus {
        classify(self.total_rent, self.total_received)
    }
}

pub fn summarize(views: &[RentRecordView]) -> LedgerTotals {
    let mut totals = LedgerTotals::default();
    for view in views {
        totals.accumulate(view);
    }
    totals
}

/// A group of payments sharing the same amount and calendar date, a
/// double-entry candidate. Heuristic only; duplicates may legitimately exist
/// and are flagged for manual review, never rejected.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub count: usize,
    pub payment_ids: Vec<Uuid>,
}

pub fn detect_duplicates(payments: &[PaymentRecord]) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    for payment in payments {
        let date = payment.payment_date.date_naive();
        match groups
            .iter_mut()
            .find(|group| group.amount == payment.amount_received && group.date == date)
        {
            Some(group) => {
                group.count += 1;
                group.payment_ids.push(payment.id);
            }
            None => groups.push(DuplicateGroup {
                amount: payment.amount_received,
                date,
                count: 1,
                payment_ids: vec![payment.id],
            }),
        }
    }
    groups.retain(|group| group.count > 1);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use crate::models::{PaymentMethod, PaymentRecord, RentRecord};

    fn record(monthly_rent: Decimal, units: Decimal, rate: Decimal) -> RentRecord {
        RentRecord {
            id: Uuid::new_v4(),
            flat_id: Uuid::new_v4(),
            month: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            monthly_rent,
            electricity_units: units,
            electricity_rate: rate,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payment(record_id: Uuid, amount: Decimal, day: u32) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4(),
            rent_record_id: record_id,
            amount_received: amount,
            payment_method: PaymentMethod::Cash,
            payment_by: "Ravi".to_string(),
            payment_date: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn total_rent_adds_metered_electricity() {
        // 6000 base + 50 units * 8 per unit
        let record = record(dec!(6000), dec!(50), dec!(8));
        assert_eq!(total_rent(&record), dec!(6400));
        let view = derive(record, &[]);
        assert_eq!(view.electricity_bill, dec!(400));
        assert_eq!(view.total_rent, dec!(6400));
        assert_eq!(view.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn single_full_payment_settles_the_month() {
        let record = record(dec!(6000), dec!(50), dec!(8));
        let payments = vec![payment(record.id, dec!(6400), 5)];
        let view = derive(record, &payments);
        assert_eq!(view.total_received, dec!(6400));
        assert_eq!(view.remaining_rent, Decimal::ZERO);
        assert!(view.is_fully_paid);
        assert_eq!(view.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn partial_payments_accumulate() {
        let record = record(dec!(6000), dec!(50), dec!(8));
        let payments = vec![
            payment(record.id, dec!(3000), 2),
            payment(record.id, dec!(2000), 9),
        ];
        let view = derive(record, &payments);
        assert_eq!(view.total_received, dec!(5000));
        assert_eq!(view.remaining_rent, dec!(1400));
        assert!(!view.is_fully_paid);
        assert_eq!(view.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn payment_exceeding_remaining_is_rejected() {
        let err = check_payment_amount(dec!(2000), dec!(1400)).unwrap_err();
        match err {
            AppError::Overpayment(message) => assert!(message.contains("1400")),
            other => panic!("expected Overpayment, got {other:?}"),
        }
        assert!(check_payment_amount(dec!(1400), dec!(1400)).is_ok());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(matches!(
            check_payment_amount(Decimal::ZERO, dec!(100)),
            Err(AppError::UnprocessableEntity(_))
        ));
        assert!(matches!(
            check_payment_amount(dec!(-5), dec!(100)),
            Err(AppError::UnprocessableEntity(_))
        ));
    }

    #[test]
    fn deletion_is_blocked_while_payments_exist() {
        let err = ensure_no_dependent_payments(2).unwrap_err();
        match err {
            AppError::HasDependentPayments(message) => assert!(message.contains("2 payment")),
            other => panic!("expected HasDependentPayments, got {other:?}"),
        }
        // With every payment removed the record becomes deletable.
        assert!(ensure_no_dependent_payments(0).is_ok());
    }

    #[test]
    fn zero_due_month_reads_as_paid() {
        let view = derive(record(Decimal::ZERO, Decimal::ZERO, dec!(8)), &[]);
        assert!(view.is_fully_paid);
        assert_eq!(view.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn month_normalizes_to_first_day() {
        let mid = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(
            normalize_month(mid),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        let first = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(normalize_month(first), first);
    }

    #[test]
    fn duplicate_detection_groups_by_amount_and_day() {
        let record_id = Uuid::new_v4();
        let payments = vec![
            payment(record_id, dec!(3000), 5),
            payment(record_id, dec!(3000), 5),
            payment(record_id, dec!(3000), 6),
            payment(record_id, dec!(500), 5),
        ];
        let groups = detect_duplicates(&payments);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].amount, dec!(3000));
        assert_eq!(groups[0].count, 2);
        assert_eq!(
            groups[0].date,
            NaiveDate::from_ymd_opt(2026, 3, 5).unwrap()
        );
    }

    #[test]
    fn flat_status_uses_summed_totals() {
        let paid_month = derive(
            record(dec!(6000), Decimal::ZERO, dec!(8)),
            &[payment(Uuid::new_v4(), dec!(6000), 3)],
        );
        let unpaid_month = derive(record(dec!(6000), Decimal::ZERO, dec!(8)), &[]);

        let totals = summarize(&[paid_month, unpaid_month]);
        assert_eq!(totals.record_count, 2);
        assert_eq!(totals.total_rent, dec!(12000));
        assert_eq!(totals.total_received, dec!(6000));
        assert_eq!(totals.total_pending, dec!(6000));
        assert_eq!(totals.paid_records, 1);
        assert_eq!(totals.unpaid_records, 1);
        // One paid and one unpaid month reads as partial at the flat level.
        assert_eq!(totals.status(), PaymentStatus::Partial);
    }

    #[test]
    fn derivation_is_idempotent() {
        let base = record(dec!(7500), dec!(120), dec!(9));
        let payments = vec![payment(base.id, dec!(4000), 4)];
        let first = derive(base.clone(), &payments);
        let second = derive(base, &payments);
        assert_eq!(first.total_rent, second.total_rent);
        assert_eq!(first.remaining_rent, second.remaining_rent);
        assert_eq!(first.payment_status, second.payment_status);
    }
}
