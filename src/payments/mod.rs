pub mod allocation;

use chrono::{DateTime, Utc};

use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::models::{AllocationEntry, Member, Payment};
use crate::store::Transaction;
use crate::types::{MemberId, PaymentId, PaymentMethod, Settlement};

pub use allocation::{AllocationEngine, InvoiceAllocation, ItemAllocation};

/// payment request
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub member_id: MemberId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn new(member_id: MemberId, amount: Money, method: PaymentMethod, paid_at: DateTime<Utc>) -> Self {
        Self {
            member_id,
            amount,
            method,
            paid_at,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(DuesError::InvalidAmount { amount: self.amount });
        }
        Ok(())
    }
}

/// result of applying one payment
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub member: Member,
    /// gross debt seen before the payment, used for classification
    pub current_debt: Money,
    /// one entry per invoice touched, in application order
    pub allocations: Vec<InvoiceAllocation>,
    pub applied: Money,
    /// excess beyond the member's debt; not carried as credit
    pub unapplied: Money,
    pub settlement: Settlement,
}

impl PaymentOutcome {
    pub fn message(&self) -> &'static str {
        self.settlement.message()
    }
}

/// a stored payment and where it went
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentHistory {
    pub payment: Payment,
    pub entries: Vec<AllocationEntry>,
}

impl PaymentHistory {
    pub fn applied(&self) -> Money {
        self.entries.iter().map(|entry| entry.amount).sum()
    }

    pub fn unapplied(&self) -> Money {
        (self.payment.amount - self.applied()).max(Money::ZERO)
    }
}

pub fn payment_history<T: Transaction>(tx: &T, payment_id: PaymentId) -> Result<PaymentHistory> {
    let payment = tx
        .payment(payment_id)?
        .ok_or(DuesError::PaymentNotFound { id: payment_id })?;
    let entries = tx.allocations_for_payment(payment_id)?;
    Ok(PaymentHistory { payment, entries })
}

/// `<prefix>-<unix millis>`, bumped a millisecond at a time until unused
pub fn next_receipt_number<T: Transaction>(
    tx: &T,
    prefix: &str,
    paid_at: DateTime<Utc>,
) -> Result<String> {
    let mut millis = paid_at.timestamp_millis();
    loop {
        let candidate = format!("{}-{}", prefix, millis);
        if !tx.receipt_number_taken(&candidate)? {
            return Ok(candidate);
        }
        millis += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPayment;
    use crate::store::{MemoryStore, Store};
    use crate::testing::seed_member;
    use crate::types::PaymentType;
    use chrono::TimeZone;

    fn paid_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let zero = PaymentRequest::new(1, Money::ZERO, PaymentMethod::Cash, paid_at());
        assert!(matches!(zero.validate(), Err(DuesError::InvalidAmount { .. })));

        let negative = PaymentRequest::new(1, Money::from_major(-5), PaymentMethod::Cash, paid_at());
        assert!(negative.validate().is_err());

        let cent = PaymentRequest::new(1, Money::CENT, PaymentMethod::Cash, paid_at());
        assert!(cent.validate().is_ok());
    }

    #[test]
    fn test_receipt_number_bumped_until_unique() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "100", "Doe");

        let first = next_receipt_number(&tx, "REC", paid_at()).unwrap();
        assert_eq!(first, format!("REC-{}", paid_at().timestamp_millis()));

        tx.insert_payment(NewPayment {
            member_id: member.id,
            amount: Money::from_major(10),
            method: PaymentMethod::Cash,
            receipt_number: first.clone(),
            payment_type: PaymentType::Advance,
            paid_at: paid_at(),
        })
        .unwrap();

        let second = next_receipt_number(&tx, "REC", paid_at()).unwrap();
        assert_eq!(second, format!("REC-{}", paid_at().timestamp_millis() + 1));
    }

    #[test]
    fn test_history_of_unknown_payment() {
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        let err = payment_history(&tx, 42).unwrap_err();
        assert!(matches!(err, DuesError::PaymentNotFound { id: 42 }));
    }
}
