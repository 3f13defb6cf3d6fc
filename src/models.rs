use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{
    AllocationId, InvoiceId, InvoiceStatus, LineItemId, MemberId, MemberStatus, PaymentId,
    PaymentMethod, PaymentType,
};

/// category assigned when registration does not name one
pub const DEFAULT_CATEGORY: &str = "Ordinary";

/// club member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub national_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub category: String,
    pub status: MemberStatus,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

/// member registration data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMember {
    pub national_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub category: Option<String>,
}

impl NewMember {
    pub fn new(national_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            national_id: national_id.into(),
            name: name.into(),
            phone: None,
            category: None,
        }
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// invoice header; its amount owed lives in the line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub member_id: MemberId,
    pub base_amount: Money,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    /// bumped on every status change
    pub version: u64,
}

/// billing data for a new invoice
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub member_id: MemberId,
    pub base_amount: Money,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// one charge component of an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub invoice_id: InvoiceId,
    pub concept: String,
    pub amount: Money,
}

/// recorded payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub member_id: MemberId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub receipt_number: String,
    pub payment_type: PaymentType,
    pub paid_at: DateTime<Utc>,
}

/// payment data before the store assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub member_id: MemberId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub receipt_number: String,
    pub payment_type: PaymentType,
    pub paid_at: DateTime<Utc>,
}

/// portion of a payment applied to one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub id: AllocationId,
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
}
