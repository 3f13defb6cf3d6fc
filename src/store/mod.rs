//! transactional persistence seam
//!
//! Every externally triggered operation runs inside exactly one
//! [`Transaction`]. A transaction that is dropped without `commit` is rolled
//! back, so an early `?` return undoes all of its writes.

pub mod memory;

use chrono::NaiveDate;

use crate::decimal::Money;
use crate::errors::Result;
use crate::models::{
    AllocationEntry, Invoice, LineItem, Member, NewInvoice, NewMember, NewPayment, Payment,
};
use crate::types::{InvoiceId, InvoiceStatus, MemberId, MemberStatus, PaymentId};

pub use memory::{FaultPoint, MemoryStore, MemoryTransaction};

/// a store that hands out transactions
pub trait Store {
    type Tx<'a>: Transaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Tx<'_>>;
}

/// operations available inside one transaction
pub trait Transaction: Sized {
    // members
    fn member(&self, id: MemberId) -> Result<Option<Member>>;
    fn member_by_national_id(&self, national_id: &str) -> Result<Option<Member>>;
    /// all members ordered by name
    fn members(&self) -> Result<Vec<Member>>;
    /// fails with `DuplicateNationalId` when the national id is taken
    fn insert_member(&mut self, member: NewMember) -> Result<Member>;
    fn set_member_status(&mut self, id: MemberId, status: MemberStatus) -> Result<Member>;

    // invoices
    fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>>;
    fn insert_invoice(&mut self, invoice: NewInvoice) -> Result<Invoice>;
    /// pending and partial invoices of a member, ascending by due date then id
    fn open_invoices(&self, member_id: MemberId) -> Result<Vec<Invoice>>;
    /// pending and partial invoices of every member due strictly before `date`
    fn open_invoices_due_before(&self, date: NaiveDate) -> Result<Vec<Invoice>>;
    /// fails with `ConcurrentModification` when `expected_version` is stale
    fn set_invoice_status(
        &mut self,
        id: InvoiceId,
        status: InvoiceStatus,
        expected_version: u64,
    ) -> Result<Invoice>;

    // line items
    fn line_items(&self, invoice_id: InvoiceId) -> Result<Vec<LineItem>>;
    fn insert_line_item(
        &mut self,
        invoice_id: InvoiceId,
        concept: &str,
        amount: Money,
    ) -> Result<LineItem>;

    // payments
    fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;
    fn receipt_number_taken(&self, receipt_number: &str) -> Result<bool>;
    fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment>;
    fn insert_allocation(
        &mut self,
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        amount: Money,
    ) -> Result<AllocationEntry>;
    fn allocations_for_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<AllocationEntry>>;
    fn allocations_for_payment(&self, payment_id: PaymentId) -> Result<Vec<AllocationEntry>>;

    fn commit(self) -> Result<()>;
    fn rollback(self) -> Result<()>;

    /// gross amount billed on an invoice
    fn invoice_total(&self, invoice_id: InvoiceId) -> Result<Money> {
        Ok(self.line_items(invoice_id)?.iter().map(|item| item.amount).sum())
    }

    /// everything ever applied to an invoice, across all payments
    fn allocated_total(&self, invoice_id: InvoiceId) -> Result<Money> {
        Ok(self
            .allocations_for_invoice(invoice_id)?
            .iter()
            .map(|entry| entry.amount)
            .sum())
    }

    /// live balance: line items minus allocations
    fn invoice_balance(&self, invoice_id: InvoiceId) -> Result<Money> {
        Ok(self.invoice_total(invoice_id)? - self.allocated_total(invoice_id)?)
    }
}
