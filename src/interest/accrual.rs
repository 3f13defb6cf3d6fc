use chrono::NaiveDate;

use crate::config::AccrualMode;
use crate::decimal::Money;
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::interest::{first_day_of_month, InterestPolicy};
use crate::store::Transaction;
use crate::types::{InvoiceId, MemberId};

/// engine that persists late interest as invoice line items
///
/// Only invoices that are still open and whose due date falls before the
/// first day of the `as_of` month are scanned. The engine never touches
/// payments or invoice status.
pub struct AccrualEngine {
    pub policy: InterestPolicy,
    pub mode: AccrualMode,
}

impl AccrualEngine {
    pub fn new(policy: InterestPolicy, mode: AccrualMode) -> Self {
        Self { policy, mode }
    }

    /// append interest items for every overdue invoice
    ///
    /// All writes go through `tx`; the caller commits or rolls back the whole
    /// batch, so an error part-way through leaves nothing behind.
    pub fn accrue<T: Transaction>(
        &self,
        tx: &mut T,
        as_of: NaiveDate,
        events: &mut EventStore,
    ) -> Result<AccrualReport> {
        let cutoff = first_day_of_month(as_of);
        let invoices = tx.open_invoices_due_before(cutoff)?;

        let mut report = AccrualReport {
            as_of,
            cutoff,
            invoices_scanned: invoices.len(),
            accrued: Vec::new(),
            skipped_existing: 0,
            skipped_not_due: 0,
        };

        for invoice in &invoices {
            let calculation = self.policy.calculate_for(invoice, as_of);
            if calculation.months_overdue == 0 || !calculation.interest_amount.is_positive() {
                report.skipped_not_due += 1;
                continue;
            }

            let items = tx.line_items(invoice.id)?;
            let amount = match self.mode {
                AccrualMode::FirstOnly => {
                    if self.policy.has_interest(&items) {
                        report.skipped_existing += 1;
                        continue;
                    }
                    calculation.interest_amount
                }
                AccrualMode::Incremental => {
                    let outstanding = calculation.interest_amount - self.policy.recorded_interest(&items);
                    if !outstanding.is_positive() {
                        report.skipped_existing += 1;
                        continue;
                    }
                    outstanding
                }
            };

            let concept = self.policy.accrual_label(calculation.months_overdue);
            tx.insert_line_item(invoice.id, &concept, amount)?;

            tracing::debug!(
                invoice_id = invoice.id,
                months_overdue = calculation.months_overdue,
                amount = %amount,
                "interest line item added"
            );

            events.emit(Event::InterestAccrued {
                invoice_id: invoice.id,
                amount,
                months_overdue: calculation.months_overdue,
                as_of,
            });

            report.accrued.push(AccruedInterest {
                invoice_id: invoice.id,
                member_id: invoice.member_id,
                months_overdue: calculation.months_overdue,
                amount,
                concept,
            });
        }

        events.emit(Event::AccrualCompleted {
            as_of,
            invoices_scanned: report.invoices_scanned,
            items_added: report.accrued.len(),
            total_interest: report.total_interest(),
        });

        Ok(report)
    }
}

/// one interest item written by an accrual run
#[derive(Debug, Clone, PartialEq)]
pub struct AccruedInterest {
    pub invoice_id: InvoiceId,
    pub member_id: MemberId,
    pub months_overdue: u32,
    pub amount: Money,
    pub concept: String,
}

/// outcome of an accrual run
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualReport {
    pub as_of: NaiveDate,
    /// invoices due on or after this date were not scanned
    pub cutoff: NaiveDate,
    pub invoices_scanned: usize,
    pub accrued: Vec<AccruedInterest>,
    /// already carried interest
    pub skipped_existing: usize,
    /// less than a full overdue month
    pub skipped_not_due: usize,
}

impl AccrualReport {
    pub fn total_interest(&self) -> Money {
        self.accrued.iter().map(|a| a.amount).sum()
    }

    pub fn items_added(&self) -> usize {
        self.accrued.len()
    }
}
