use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::PaymentConfig;
use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::events::{Event, EventStore};
use crate::models::{LineItem, NewPayment};
use crate::store::Transaction;
use crate::types::{InvoiceId, InvoiceStatus, PaymentType, Settlement};

use super::{next_receipt_number, PaymentOutcome, PaymentRequest};

/// how an applied amount spreads over the items of one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAllocation {
    pub concept: String,
    pub original_amount: Money,
    pub applied_amount: Money,
}

/// what one payment did to one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAllocation {
    pub invoice_id: InvoiceId,
    pub due_date: NaiveDate,
    pub amount_applied: Money,
    pub invoice_total: Money,
    pub balance_after: Money,
    pub status_after: InvoiceStatus,
    pub items: Vec<ItemAllocation>,
}

/// applies payments to open invoices, oldest due date first
pub struct AllocationEngine {
    /// balances at or below this count as settled
    pub settlement_tolerance: Money,
    pub receipt_prefix: String,
}

impl AllocationEngine {
    pub fn new(settlement_tolerance: Money, receipt_prefix: impl Into<String>) -> Self {
        Self {
            settlement_tolerance,
            receipt_prefix: receipt_prefix.into(),
        }
    }

    pub fn from_config(config: &PaymentConfig) -> Self {
        Self::new(config.settlement_tolerance, config.receipt_prefix.clone())
    }

    /// record the payment and allocate it inside `tx`
    ///
    /// Nothing is committed here. Amounts applied are capped by each
    /// invoice's live balance, so a balance never goes negative; whatever is
    /// left once every open invoice is settled is reported as unapplied.
    pub fn allocate<T: Transaction>(
        &self,
        tx: &mut T,
        request: &PaymentRequest,
        events: &mut EventStore,
    ) -> Result<PaymentOutcome> {
        request.validate()?;

        let member = tx
            .member(request.member_id)?
            .ok_or_else(|| DuesError::MemberNotFound {
                key: request.member_id.to_string(),
            })?;

        let open = tx.open_invoices(member.id)?;
        let mut current_debt = Money::ZERO;
        for invoice in &open {
            current_debt += tx.invoice_total(invoice.id)?;
        }

        let payment_type = if current_debt.is_positive() {
            PaymentType::Normal
        } else {
            PaymentType::Advance
        };

        let receipt_number = next_receipt_number(tx, &self.receipt_prefix, request.paid_at)?;
        let payment = tx.insert_payment(NewPayment {
            member_id: member.id,
            amount: request.amount,
            method: request.method,
            receipt_number,
            payment_type,
            paid_at: request.paid_at,
        })?;

        events.emit(Event::PaymentReceived {
            payment_id: payment.id,
            member_id: member.id,
            amount: payment.amount,
            payment_type,
            timestamp: payment.paid_at,
        });

        let mut remaining = request.amount;
        let mut allocations = Vec::new();

        if payment_type == PaymentType::Normal {
            for invoice in &open {
                if !remaining.is_positive() {
                    break;
                }

                let items = tx.line_items(invoice.id)?;
                let invoice_total: Money = items.iter().map(|item| item.amount).sum();
                if !invoice_total.is_positive() {
                    continue;
                }

                let outstanding = invoice_total - tx.allocated_total(invoice.id)?;
                if !outstanding.is_positive() {
                    continue;
                }

                let amount_applied = remaining.min(outstanding);
                tx.insert_allocation(payment.id, invoice.id, amount_applied)?;

                let balance_after = tx.invoice_balance(invoice.id)?;
                let status_after = if balance_after <= self.settlement_tolerance {
                    InvoiceStatus::Paid
                } else {
                    InvoiceStatus::Partial
                };
                tx.set_invoice_status(invoice.id, status_after, invoice.version)?;

                tracing::debug!(
                    payment_id = payment.id,
                    invoice_id = invoice.id,
                    applied = %amount_applied,
                    balance = %balance_after,
                    "payment applied to invoice"
                );

                events.emit(Event::PaymentAllocated {
                    payment_id: payment.id,
                    invoice_id: invoice.id,
                    amount: amount_applied,
                });
                if status_after != invoice.status {
                    events.emit(Event::InvoiceStatusChanged {
                        invoice_id: invoice.id,
                        old_status: invoice.status,
                        new_status: status_after,
                        balance: balance_after,
                    });
                }

                remaining -= amount_applied;
                allocations.push(InvoiceAllocation {
                    invoice_id: invoice.id,
                    due_date: invoice.due_date,
                    amount_applied,
                    invoice_total,
                    balance_after,
                    status_after,
                    items: split_across_items(&items, amount_applied, invoice_total),
                });
            }
        }

        let unapplied = remaining.max(Money::ZERO);
        if unapplied.is_positive() {
            tracing::debug!(payment_id = payment.id, unapplied = %unapplied, "payment exceeds debt");
            events.emit(Event::ExcessUnapplied {
                payment_id: payment.id,
                amount: unapplied,
            });
        }

        let settlement = match payment_type {
            PaymentType::Advance => Settlement::Advance,
            PaymentType::Normal if tx.open_invoices(member.id)?.is_empty() => Settlement::FullySettled,
            PaymentType::Normal => Settlement::PartiallySettled,
        };

        Ok(PaymentOutcome {
            applied: request.amount - unapplied,
            payment,
            member,
            current_debt,
            allocations,
            unapplied,
            settlement,
        })
    }
}

/// proportional share per item, truncated to cents; the last item takes the
/// remainder, which is therefore never negative
fn split_across_items(items: &[LineItem], applied: Money, invoice_total: Money) -> Vec<ItemAllocation> {
    let mut split = Vec::with_capacity(items.len());
    let mut assigned = Money::ZERO;

    for (index, item) in items.iter().enumerate() {
        let applied_amount = if index + 1 == items.len() {
            applied - assigned
        } else {
            item.amount.pro_rata_truncated(applied, invoice_total)
        };
        assigned += applied_amount;
        split.push(ItemAllocation {
            concept: item.concept.clone(),
            original_amount: item.amount,
            applied_amount,
        });
    }

    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewInvoice;
    use crate::store::{FaultPoint, MemoryStore, Store};
    use crate::testing::{date, seed_invoice, seed_member};
    use crate::types::{MemberStatus, PaymentMethod};
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn engine() -> AllocationEngine {
        AllocationEngine::from_config(&PaymentConfig::default())
    }

    fn paid_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn request(member_id: u64, amount: Money) -> PaymentRequest {
        PaymentRequest::new(member_id, amount, PaymentMethod::Cash, paid_at())
    }

    #[test]
    fn test_full_payment_settles_invoice() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "100", "Doe");
        let invoice = seed_invoice(&mut tx, member.id, 100, date(2024, 1, 30));
        tx.insert_line_item(invoice.id, "Late interest (2% x 1 month)", Money::from_major(2))
            .unwrap();

        let mut events = EventStore::new();
        let outcome = engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(102)), &mut events)
            .unwrap();

        assert_eq!(outcome.payment.payment_type, PaymentType::Normal);
        assert_eq!(outcome.current_debt, Money::from_major(102));
        assert_eq!(outcome.settlement, Settlement::FullySettled);
        assert_eq!(outcome.allocations.len(), 1);
        assert_eq!(outcome.allocations[0].amount_applied, Money::from_major(102));
        assert_eq!(outcome.allocations[0].status_after, InvoiceStatus::Paid);
        assert_eq!(outcome.unapplied, Money::ZERO);
        assert!(outcome.payment.receipt_number.starts_with("REC-"));

        assert_eq!(tx.invoice(invoice.id).unwrap().unwrap().status, InvoiceStatus::Paid);
        assert_eq!(tx.invoice_balance(invoice.id).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_partial_payment_leaves_balance() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "100", "Doe");
        let invoice = seed_invoice(&mut tx, member.id, 100, date(2024, 1, 30));
        tx.insert_line_item(invoice.id, "Late interest (2% x 1 month)", Money::from_major(2))
            .unwrap();

        let mut events = EventStore::new();
        let outcome = engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(50)), &mut events)
            .unwrap();

        assert_eq!(outcome.payment.payment_type, PaymentType::Normal);
        assert_eq!(outcome.settlement, Settlement::PartiallySettled);
        let allocation = &outcome.allocations[0];
        assert_eq!(allocation.status_after, InvoiceStatus::Partial);
        assert_eq!(allocation.balance_after, Money::from_major(52));

        // 100 * 50 / 102 = 49.0196 -> 49.01, interest takes the rest
        assert_eq!(allocation.items[0].applied_amount.as_decimal(), dec!(49.01));
        assert_eq!(allocation.items[1].applied_amount.as_decimal(), dec!(0.99));
        let item_sum: Money = allocation.items.iter().map(|i| i.applied_amount).sum();
        assert_eq!(item_sum, allocation.amount_applied);
    }

    #[test]
    fn test_oldest_invoice_first() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "100", "Doe");
        let march = seed_invoice(&mut tx, member.id, 60, date(2024, 3, 1));
        let january = seed_invoice(&mut tx, member.id, 60, date(2024, 1, 1));
        let february = seed_invoice(&mut tx, member.id, 60, date(2024, 2, 1));

        let mut events = EventStore::new();
        let outcome = engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(90)), &mut events)
            .unwrap();

        let touched: Vec<InvoiceId> = outcome.allocations.iter().map(|a| a.invoice_id).collect();
        assert_eq!(touched, vec![january.id, february.id]);
        assert_eq!(tx.invoice(january.id).unwrap().unwrap().status, InvoiceStatus::Paid);
        assert_eq!(tx.invoice(february.id).unwrap().unwrap().status, InvoiceStatus::Partial);
        assert_eq!(tx.invoice(march.id).unwrap().unwrap().status, InvoiceStatus::Pending);
        assert!(tx.allocations_for_invoice(march.id).unwrap().is_empty());
        assert_eq!(tx.invoice_balance(february.id).unwrap(), Money::from_major(30));
    }

    #[test]
    fn test_overpayment_pays_everything_and_reports_excess() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "100", "Doe");
        let first = seed_invoice(&mut tx, member.id, 40, date(2024, 1, 1));
        let second = seed_invoice(&mut tx, member.id, 25, date(2024, 2, 1));

        let mut events = EventStore::new();
        let outcome = engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(100)), &mut events)
            .unwrap();

        assert_eq!(outcome.settlement, Settlement::FullySettled);
        assert_eq!(outcome.applied, Money::from_major(65));
        assert_eq!(outcome.unapplied, Money::from_major(35));

        let allocated = tx.allocated_total(first.id).unwrap() + tx.allocated_total(second.id).unwrap();
        let billed = tx.invoice_total(first.id).unwrap() + tx.invoice_total(second.id).unwrap();
        assert_eq!(allocated, billed);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::ExcessUnapplied { amount, .. } if *amount == Money::from_major(35))));
    }

    #[test]
    fn test_second_payment_only_covers_remaining_balance() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "100", "Doe");
        let invoice = seed_invoice(&mut tx, member.id, 100, date(2024, 1, 1));

        let mut events = EventStore::new();
        engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(70)), &mut events)
            .unwrap();
        let second = engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(50)), &mut events)
            .unwrap();

        // gross debt still counts the partially paid invoice in full
        assert_eq!(second.current_debt, Money::from_major(100));
        assert_eq!(second.allocations[0].amount_applied, Money::from_major(30));
        assert_eq!(second.unapplied, Money::from_major(20));
        assert_eq!(tx.invoice_balance(invoice.id).unwrap(), Money::ZERO);
        assert_eq!(tx.invoice(invoice.id).unwrap().unwrap().status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_no_debt_is_advance() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "200", "Roe");

        let mut events = EventStore::new();
        let outcome = engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(20)), &mut events)
            .unwrap();

        assert_eq!(outcome.payment.payment_type, PaymentType::Advance);
        assert_eq!(outcome.settlement, Settlement::Advance);
        assert!(outcome.allocations.is_empty());
        assert_eq!(outcome.unapplied, Money::from_major(20));
        assert!(tx.allocations_for_payment(outcome.payment.id).unwrap().is_empty());
    }

    #[test]
    fn test_zero_total_invoices_skipped() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "100", "Doe");
        let empty = tx
            .insert_invoice(NewInvoice {
                member_id: member.id,
                base_amount: Money::ZERO,
                issue_date: date(2023, 12, 1),
                due_date: date(2023, 12, 15),
            })
            .unwrap();
        let billed = seed_invoice(&mut tx, member.id, 30, date(2024, 1, 15));

        let mut events = EventStore::new();
        let outcome = engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(30)), &mut events)
            .unwrap();

        assert_eq!(outcome.allocations.len(), 1);
        assert_eq!(outcome.allocations[0].invoice_id, billed.id);
        assert_eq!(tx.invoice(empty.id).unwrap().unwrap().status, InvoiceStatus::Pending);
    }

    #[test]
    fn test_equal_split_rounding() {
        let items: Vec<LineItem> = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, concept)| LineItem {
                id: i as u64 + 1,
                invoice_id: 1,
                concept: concept.to_string(),
                amount: Money::from_major(10),
            })
            .collect();

        let split = split_across_items(&items, Money::from_major(10), Money::from_major(30));
        let applied: Vec<String> = split.iter().map(|s| s.applied_amount.to_fixed()).collect();
        assert_eq!(applied, vec!["3.33", "3.33", "3.34"]);
    }

    #[test]
    fn test_small_split_never_negative() {
        let items: Vec<LineItem> = (1..=4)
            .map(|i| LineItem {
                id: i,
                invoice_id: 1,
                concept: format!("Item {}", i),
                amount: Money::from_major(1),
            })
            .collect();

        let split = split_across_items(&items, Money::from_minor(2), Money::from_major(4));
        let applied: Vec<String> = split.iter().map(|s| s.applied_amount.to_fixed()).collect();
        assert_eq!(applied, vec!["0.00", "0.00", "0.00", "0.02"]);
        assert!(split.iter().all(|s| !s.applied_amount.is_negative()));
    }

    #[test]
    fn test_unknown_member_and_bad_amount() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let mut events = EventStore::new();

        let err = engine()
            .allocate(&mut tx, &request(99, Money::from_major(10)), &mut events)
            .unwrap_err();
        assert!(matches!(err, DuesError::MemberNotFound { .. }));

        let member = seed_member(&mut tx, "100", "Doe");
        let err = engine()
            .allocate(&mut tx, &request(member.id, Money::ZERO), &mut events)
            .unwrap_err();
        assert!(matches!(err, DuesError::InvalidAmount { .. }));
        assert!(events.is_empty());
    }

    #[test]
    fn test_inactive_member_can_still_pay() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let member = seed_member(&mut tx, "100", "Doe");
        seed_invoice(&mut tx, member.id, 40, date(2024, 1, 1));
        tx.set_member_status(member.id, MemberStatus::Inactive).unwrap();

        let mut events = EventStore::new();
        let outcome = engine()
            .allocate(&mut tx, &request(member.id, Money::from_major(40)), &mut events)
            .unwrap();
        assert_eq!(outcome.settlement, Settlement::FullySettled);
    }

    #[test]
    fn test_failed_allocation_rolls_back() {
        let store = MemoryStore::new();
        let (member, first, second) = {
            let mut tx = store.begin().unwrap();
            let member = seed_member(&mut tx, "100", "Doe");
            let first = seed_invoice(&mut tx, member.id, 40, date(2024, 1, 1));
            let second = seed_invoice(&mut tx, member.id, 40, date(2024, 2, 1));
            tx.commit().unwrap();
            (member, first, second)
        };

        store.fail_on(FaultPoint::InsertAllocation, 1);
        {
            let mut tx = store.begin().unwrap();
            let mut events = EventStore::new();
            let result = engine().allocate(&mut tx, &request(member.id, Money::from_major(80)), &mut events);
            assert!(result.is_err());
        }

        let tx = store.begin().unwrap();
        for id in [first.id, second.id] {
            assert_eq!(tx.invoice(id).unwrap().unwrap().status, InvoiceStatus::Pending);
            assert!(tx.allocations_for_invoice(id).unwrap().is_empty());
        }
        assert!(!tx
            .receipt_number_taken(&format!("REC-{}", paid_at().timestamp_millis()))
            .unwrap());
    }
}
