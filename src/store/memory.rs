use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::models::{
    AllocationEntry, Invoice, LineItem, Member, NewInvoice, NewMember, NewPayment, Payment,
    DEFAULT_CATEGORY,
};
use crate::store::{Store, Transaction};
use crate::types::{InvoiceId, InvoiceStatus, MemberId, MemberStatus, PaymentId};

/// write operations that can be made to fail for rollback testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    InsertLineItem,
    InsertPayment,
    InsertAllocation,
    SetInvoiceStatus,
    Commit,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    point: FaultPoint,
    /// successful calls left before the fault fires
    remaining: usize,
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    member: u64,
    invoice: u64,
    line_item: u64,
    payment: u64,
    allocation: u64,
}

fn next(seq: &mut u64) -> u64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct Tables {
    members: BTreeMap<MemberId, Member>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    line_items: BTreeMap<u64, LineItem>,
    payments: BTreeMap<PaymentId, Payment>,
    allocations: BTreeMap<u64, AllocationEntry>,
    seq: Sequences,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    fault: Mutex<Option<Fault>>,
}

/// in-process store
///
/// A transaction holds the table lock from `begin` until it is committed,
/// rolled back or dropped, so transactions are fully serialized. Cloning the
/// store shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// make the `after + 1`-th call to `point` fail
    pub fn fail_on(&self, point: FaultPoint, after: usize) {
        if let Ok(mut fault) = self.shared.fault.lock() {
            *fault = Some(Fault {
                point,
                remaining: after,
            });
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut fault) = self.shared.fault.lock() {
            *fault = None;
        }
    }
}

impl Store for MemoryStore {
    type Tx<'a> = MemoryTransaction<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<MemoryTransaction<'_>> {
        let tables = self
            .shared
            .tables
            .lock()
            .map_err(|_| DuesError::transaction("store lock poisoned"))?;
        let snapshot = tables.clone();

        Ok(MemoryTransaction {
            tables,
            snapshot: Some(snapshot),
            fault: &self.shared.fault,
        })
    }
}

/// open transaction on a [`MemoryStore`]
pub struct MemoryTransaction<'a> {
    tables: MutexGuard<'a, Tables>,
    /// state at `begin`; `None` once finished
    snapshot: Option<Tables>,
    fault: &'a Mutex<Option<Fault>>,
}

impl MemoryTransaction<'_> {
    fn check_fault(&self, point: FaultPoint) -> Result<()> {
        let mut guard = self
            .fault
            .lock()
            .map_err(|_| DuesError::transaction("fault lock poisoned"))?;
        if let Some(fault) = guard.as_mut() {
            if fault.point == point {
                if fault.remaining == 0 {
                    *guard = None;
                    return Err(DuesError::transaction(format!("injected fault at {:?}", point)));
                }
                fault.remaining -= 1;
            }
        }
        Ok(())
    }

    fn require_invoice(&self, id: InvoiceId) -> Result<&Invoice> {
        self.tables
            .invoices
            .get(&id)
            .ok_or(DuesError::InvoiceNotFound { id })
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables = snapshot;
        }
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn member(&self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.tables.members.get(&id).cloned())
    }

    fn member_by_national_id(&self, national_id: &str) -> Result<Option<Member>> {
        Ok(self
            .tables
            .members
            .values()
            .find(|m| m.national_id == national_id)
            .cloned())
    }

    fn members(&self) -> Result<Vec<Member>> {
        let mut members: Vec<Member> = self.tables.members.values().cloned().collect();
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    fn insert_member(&mut self, member: NewMember) -> Result<Member> {
        if self
            .tables
            .members
            .values()
            .any(|m| m.national_id == member.national_id)
        {
            return Err(DuesError::DuplicateNationalId {
                national_id: member.national_id,
            });
        }

        let id = next(&mut self.tables.seq.member);
        let record = Member {
            id,
            national_id: member.national_id,
            name: member.name,
            phone: member.phone,
            category: member.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            status: MemberStatus::Active,
        };
        self.tables.members.insert(id, record.clone());
        Ok(record)
    }

    fn set_member_status(&mut self, id: MemberId, status: MemberStatus) -> Result<Member> {
        let member = self
            .tables
            .members
            .get_mut(&id)
            .ok_or(DuesError::MemberNotFound { key: id.to_string() })?;
        member.status = status;
        Ok(member.clone())
    }

    fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        Ok(self.tables.invoices.get(&id).cloned())
    }

    fn insert_invoice(&mut self, invoice: NewInvoice) -> Result<Invoice> {
        if !self.tables.members.contains_key(&invoice.member_id) {
            return Err(DuesError::MemberNotFound {
                key: invoice.member_id.to_string(),
            });
        }

        let id = next(&mut self.tables.seq.invoice);
        let record = Invoice {
            id,
            member_id: invoice.member_id,
            base_amount: invoice.base_amount,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            status: InvoiceStatus::Pending,
            version: 0,
        };
        self.tables.invoices.insert(id, record.clone());
        Ok(record)
    }

    fn open_invoices(&self, member_id: MemberId) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .tables
            .invoices
            .values()
            .filter(|inv| inv.member_id == member_id && inv.status.is_open())
            .cloned()
            .collect();
        invoices.sort_by_key(|inv| (inv.due_date, inv.id));
        Ok(invoices)
    }

    fn open_invoices_due_before(&self, date: NaiveDate) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .tables
            .invoices
            .values()
            .filter(|inv| inv.status.is_open() && inv.due_date < date)
            .cloned()
            .collect();
        invoices.sort_by_key(|inv| (inv.due_date, inv.id));
        Ok(invoices)
    }

    fn set_invoice_status(
        &mut self,
        id: InvoiceId,
        status: InvoiceStatus,
        expected_version: u64,
    ) -> Result<Invoice> {
        self.check_fault(FaultPoint::SetInvoiceStatus)?;

        let invoice = self
            .tables
            .invoices
            .get_mut(&id)
            .ok_or(DuesError::InvoiceNotFound { id })?;
        if invoice.version != expected_version {
            return Err(DuesError::ConcurrentModification {
                id,
                expected: expected_version,
                found: invoice.version,
            });
        }
        invoice.status = status;
        invoice.version += 1;
        Ok(invoice.clone())
    }

    fn line_items(&self, invoice_id: InvoiceId) -> Result<Vec<LineItem>> {
        Ok(self
            .tables
            .line_items
            .values()
            .filter(|item| item.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    fn insert_line_item(
        &mut self,
        invoice_id: InvoiceId,
        concept: &str,
        amount: Money,
    ) -> Result<LineItem> {
        self.check_fault(FaultPoint::InsertLineItem)?;
        self.require_invoice(invoice_id)?;

        if amount.is_negative() {
            return Err(DuesError::InvalidInput {
                message: format!("line item amount must not be negative: {}", amount),
            });
        }

        let id = next(&mut self.tables.seq.line_item);
        let record = LineItem {
            id,
            invoice_id,
            concept: concept.to_string(),
            amount,
        };
        self.tables.line_items.insert(id, record.clone());
        Ok(record)
    }

    fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.payments.get(&id).cloned())
    }

    fn receipt_number_taken(&self, receipt_number: &str) -> Result<bool> {
        Ok(self
            .tables
            .payments
            .values()
            .any(|p| p.receipt_number == receipt_number))
    }

    fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment> {
        self.check_fault(FaultPoint::InsertPayment)?;

        if !self.tables.members.contains_key(&payment.member_id) {
            return Err(DuesError::MemberNotFound {
                key: payment.member_id.to_string(),
            });
        }
        if self.receipt_number_taken(&payment.receipt_number)? {
            return Err(DuesError::DuplicateReceiptNumber {
                receipt_number: payment.receipt_number,
            });
        }

        let id = next(&mut self.tables.seq.payment);
        let record = Payment {
            id,
            member_id: payment.member_id,
            amount: payment.amount,
            method: payment.method,
            receipt_number: payment.receipt_number,
            payment_type: payment.payment_type,
            paid_at: payment.paid_at,
        };
        self.tables.payments.insert(id, record.clone());
        Ok(record)
    }

    fn insert_allocation(
        &mut self,
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        amount: Money,
    ) -> Result<AllocationEntry> {
        self.check_fault(FaultPoint::InsertAllocation)?;
        self.require_invoice(invoice_id)?;

        if !self.tables.payments.contains_key(&payment_id) {
            return Err(DuesError::transaction(format!(
                "allocation references unknown payment {}",
                payment_id
            )));
        }

        let id = next(&mut self.tables.seq.allocation);
        let record = AllocationEntry {
            id,
            payment_id,
            invoice_id,
            amount,
        };
        self.tables.allocations.insert(id, record.clone());
        Ok(record)
    }

    fn allocations_for_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<AllocationEntry>> {
        Ok(self
            .tables
            .allocations
            .values()
            .filter(|a| a.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    fn allocations_for_payment(&self, payment_id: PaymentId) -> Result<Vec<AllocationEntry>> {
        Ok(self
            .tables
            .allocations
            .values()
            .filter(|a| a.payment_id == payment_id)
            .cloned()
            .collect())
    }

    fn commit(mut self) -> Result<()> {
        // on failure `self` drops with its snapshot and rolls back
        self.check_fault(FaultPoint::Commit)?;
        self.snapshot = None;
        Ok(())
    }

    fn rollback(mut self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables = snapshot;
        }
        Ok(())
    }
}
