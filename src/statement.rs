use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::interest::InterestPolicy;
use crate::models::Member;
use crate::store::Transaction;
use crate::types::{InvoiceId, InvoiceStatus, MemberId};

/// how a statement request identifies the member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberLookup {
    Id(MemberId),
    NationalId(String),
}

impl MemberLookup {
    fn key(&self) -> String {
        match self {
            MemberLookup::Id(id) => id.to_string(),
            MemberLookup::NationalId(national_id) => national_id.clone(),
        }
    }
}

/// one line of an invoice as shown on a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementItem {
    pub concept: String,
    pub amount: Money,
    /// computed for display only, not stored
    pub projected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceStatement {
    pub id: InvoiceId,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub items: Vec<StatementItem>,
    /// persisted plus projected items
    pub total: Money,
    /// already applied by earlier payments
    pub paid_to_date: Money,
}

impl InvoiceStatement {
    pub fn outstanding(&self) -> Money {
        (self.total - self.paid_to_date).max(Money::ZERO)
    }
}

/// read-only view of what a member owes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub member: Member,
    pub as_of: NaiveDate,
    /// gross sum of every item on every open invoice
    pub total_debt: Money,
    pub invoices: Vec<InvoiceStatement>,
}

impl AccountStatement {
    /// total debt net of partial payments already applied
    pub fn outstanding_balance(&self) -> Money {
        self.invoices.iter().map(|inv| inv.outstanding()).sum()
    }

    pub fn projected_interest(&self) -> Money {
        self.invoices
            .iter()
            .flat_map(|inv| inv.items.iter())
            .filter(|item| item.projected)
            .map(|item| item.amount)
            .sum()
    }
}

/// builds account statements, projecting interest the accrual run has not written yet
pub struct StatementBuilder {
    pub policy: InterestPolicy,
}

impl StatementBuilder {
    pub fn new(policy: InterestPolicy) -> Self {
        Self { policy }
    }

    pub fn build<T: Transaction>(
        &self,
        tx: &T,
        lookup: &MemberLookup,
        as_of: NaiveDate,
    ) -> Result<AccountStatement> {
        let member = match lookup {
            MemberLookup::Id(id) => tx.member(*id)?,
            MemberLookup::NationalId(national_id) => tx.member_by_national_id(national_id)?,
        }
        .ok_or_else(|| DuesError::MemberNotFound { key: lookup.key() })?;

        if !member.is_active() {
            return Err(DuesError::MemberInactive {
                national_id: member.national_id,
            });
        }

        let mut invoices = Vec::new();
        let mut total_debt = Money::ZERO;

        for invoice in tx.open_invoices(member.id)? {
            let persisted = tx.line_items(invoice.id)?;
            let has_interest = self.policy.has_interest(&persisted);

            let mut items: Vec<StatementItem> = persisted
                .into_iter()
                .map(|item| StatementItem {
                    concept: item.concept,
                    amount: item.amount,
                    projected: false,
                })
                .collect();

            let projection = self.policy.calculate_for(&invoice, as_of);
            if !has_interest && projection.interest_amount.is_positive() {
                items.push(StatementItem {
                    concept: self.policy.projection_label(),
                    amount: projection.interest_amount,
                    projected: true,
                });
            }

            let total: Money = items.iter().map(|item| item.amount).sum();
            total_debt += total;

            invoices.push(InvoiceStatement {
                id: invoice.id,
                issue_date: invoice.issue_date,
                due_date: invoice.due_date,
                status: invoice.status,
                items,
                total,
                paid_to_date: tx.allocated_total(invoice.id)?,
            });
        }

        Ok(AccountStatement {
            member,
            as_of,
            total_debt,
            invoices,
        })
    }
}
