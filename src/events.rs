use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{InvoiceId, InvoiceStatus, MemberId, PaymentId, PaymentType};

/// all events emitted by the dues ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // membership events
    MemberRegistered {
        member_id: MemberId,
        national_id: String,
        timestamp: DateTime<Utc>,
    },
    MemberDeactivated {
        member_id: MemberId,
        timestamp: DateTime<Utc>,
    },

    // billing events
    InvoiceIssued {
        invoice_id: InvoiceId,
        member_id: MemberId,
        amount: Money,
        due_date: NaiveDate,
    },

    // interest events
    InterestAccrued {
        invoice_id: InvoiceId,
        amount: Money,
        months_overdue: u32,
        as_of: NaiveDate,
    },
    AccrualCompleted {
        as_of: NaiveDate,
        invoices_scanned: usize,
        items_added: usize,
        total_interest: Money,
    },

    // payment events
    PaymentReceived {
        payment_id: PaymentId,
        member_id: MemberId,
        amount: Money,
        payment_type: PaymentType,
        timestamp: DateTime<Utc>,
    },
    PaymentAllocated {
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        amount: Money,
    },
    InvoiceStatusChanged {
        invoice_id: InvoiceId,
        old_status: InvoiceStatus,
        new_status: InvoiceStatus,
        balance: Money,
    },
    ExcessUnapplied {
        payment_id: PaymentId,
        amount: Money,
    },
    ReceiptIssued {
        payment_id: PaymentId,
        receipt_number: String,
        path: String,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// move every event of `other` into this store
    pub fn absorb(&mut self, other: &mut EventStore) {
        self.events.append(&mut other.events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
