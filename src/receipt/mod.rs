//! plain-text payment receipts
//!
//! Formatting is pure: the same payment, member and allocations always give
//! the same document. Writing the document somewhere is the job of a
//! [`ReceiptStore`].

pub mod storage;

use std::fmt::Write;

use crate::config::ClubConfig;
use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::models::{Member, Payment};
use crate::payments::InvoiceAllocation;

pub use storage::{FsReceiptStore, ReceiptStore, StagedReceipt};

const RULE_WIDTH: usize = 72;

/// a rendered receipt and the name it is published under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDocument {
    pub file_name: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ReceiptFormatter {
    club_name: String,
    currency_symbol: String,
    file_extension: String,
}

impl ReceiptFormatter {
    pub fn new(
        club_name: impl Into<String>,
        currency_symbol: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            club_name: club_name.into(),
            currency_symbol: currency_symbol.into(),
            file_extension: file_extension.into(),
        }
    }

    pub fn from_config(config: &ClubConfig) -> Self {
        Self::new(
            config.club_name.clone(),
            config.currency_symbol.clone(),
            config.receipts.file_extension.clone(),
        )
    }

    /// `receipt_<receipt number>_<national id>.<ext>`
    pub fn file_name(&self, payment: &Payment, member: &Member) -> Result<String> {
        for (field, value) in [
            ("receipt number", payment.receipt_number.as_str()),
            ("national id", member.national_id.as_str()),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) || value.contains("..") {
                return Err(DuesError::Render {
                    message: format!("{} cannot be used in a file name: {:?}", field, value),
                });
            }
        }
        Ok(format!(
            "receipt_{}_{}.{}",
            payment.receipt_number, member.national_id, self.file_extension
        ))
    }

    pub fn format(
        &self,
        payment: &Payment,
        member: &Member,
        allocations: &[InvoiceAllocation],
    ) -> Result<ReceiptDocument> {
        let file_name = self.file_name(payment, member)?;
        let body = self.render(payment, member, allocations).map_err(|e| DuesError::Render {
            message: e.to_string(),
        })?;
        Ok(ReceiptDocument { file_name, body })
    }

    fn money(&self, amount: Money) -> String {
        format!("{} {}", self.currency_symbol, amount.to_fixed())
    }

    fn render(
        &self,
        payment: &Payment,
        member: &Member,
        allocations: &[InvoiceAllocation],
    ) -> std::result::Result<String, std::fmt::Error> {
        let mut out = String::new();
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(out, "{:^width$}", self.club_name, width = RULE_WIDTH)?;
        writeln!(out, "{:^width$}", "PAYMENT RECEIPT", width = RULE_WIDTH)?;
        writeln!(out, "{}", rule)?;
        writeln!(out, "Receipt No: {}", payment.receipt_number)?;
        writeln!(out, "Date: {}", payment.paid_at.format("%d/%m/%Y"))?;
        writeln!(out, "Member: {}", member.name)?;
        writeln!(out, "National ID: {}", member.national_id)?;
        writeln!(out, "Payment method: {}", payment.method.as_str().to_uppercase())?;
        writeln!(out)?;
        writeln!(
            out,
            "{:>width$}",
            format!("Total amount paid: {}", self.money(payment.amount)),
            width = RULE_WIDTH
        )?;
        writeln!(out)?;

        if allocations.is_empty() {
            writeln!(out, "Advance payment - not applied to any outstanding debt")?;
        } else {
            writeln!(out, "Payment allocation detail:")?;
            writeln!(out)?;
            writeln!(
                out,
                "{:<10}{:<32}{:>15}{:>15}",
                "Invoice", "Concept", "Original", "Applied"
            )?;
            writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;

            for (index, allocation) in allocations.iter().enumerate() {
                for (row, item) in allocation.items.iter().enumerate() {
                    let label = if row == 0 {
                        format!("#{}", allocation.invoice_id)
                    } else {
                        String::new()
                    };
                    writeln!(
                        out,
                        "{:<10}{:<32}{:>15}{:>15}",
                        label,
                        item.concept,
                        self.money(item.original_amount),
                        self.money(item.applied_amount)
                    )?;
                }
                if index + 1 < allocations.len() {
                    writeln!(out, "{}", "- ".repeat(RULE_WIDTH / 2))?;
                }
            }

            writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
            writeln!(
                out,
                "{:<42}{:>30}",
                "TOTAL PAID:",
                self.money(payment.amount)
            )?;
        }

        writeln!(out)?;
        writeln!(out, "{}", rule)?;
        writeln!(out, "{:^width$}", "Thank you for your payment.", width = RULE_WIDTH)?;
        writeln!(out, "{:^width$}", "This is an official payment receipt.", width = RULE_WIDTH)?;

        Ok(out)
    }
}

impl Default for ReceiptFormatter {
    fn default() -> Self {
        Self::from_config(&ClubConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::ItemAllocation;
    use crate::testing::date;
    use crate::types::{InvoiceStatus, MemberStatus, PaymentMethod, PaymentType};
    use chrono::{TimeZone, Utc};

    fn member() -> Member {
        Member {
            id: 1,
            national_id: "12345678".to_string(),
            name: "Jane Doe".to_string(),
            phone: None,
            category: "Ordinary".to_string(),
            status: MemberStatus::Active,
        }
    }

    fn payment(amount: i64, payment_type: PaymentType) -> Payment {
        Payment {
            id: 7,
            member_id: 1,
            amount: Money::from_major(amount),
            method: PaymentMethod::Transfer,
            receipt_number: "REC-1710072000000".to_string(),
            payment_type,
            paid_at: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        }
    }

    fn allocation(invoice_id: u64, applied: &str, items: &[(&str, &str, &str)]) -> InvoiceAllocation {
        InvoiceAllocation {
            invoice_id,
            due_date: date(2024, 1, 30),
            amount_applied: Money::from_str_exact(applied).unwrap(),
            invoice_total: Money::ZERO,
            balance_after: Money::ZERO,
            status_after: InvoiceStatus::Paid,
            items: items
                .iter()
                .map(|(concept, original, applied)| ItemAllocation {
                    concept: concept.to_string(),
                    original_amount: Money::from_str_exact(original).unwrap(),
                    applied_amount: Money::from_str_exact(applied).unwrap(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_receipt_with_breakdown() {
        let formatter = ReceiptFormatter::default();
        let allocations = vec![
            allocation(3, "102", &[("Monthly dues", "100", "100"), ("Late interest (2% x 1 month)", "2", "2")]),
            allocation(4, "18", &[("Monthly dues", "80", "18")]),
        ];

        let doc = formatter
            .format(&payment(120, PaymentType::Normal), &member(), &allocations)
            .unwrap();

        assert_eq!(doc.file_name, "receipt_REC-1710072000000_12345678.txt");
        assert!(doc.body.contains("CLUB ATENAS"));
        assert!(doc.body.contains("Receipt No: REC-1710072000000"));
        assert!(doc.body.contains("Date: 10/03/2024"));
        assert!(doc.body.contains("National ID: 12345678"));
        assert!(doc.body.contains("Payment method: TRANSFER"));
        assert!(doc.body.contains("Total amount paid: S/ 120.00"));
        assert!(doc.body.contains("#3"));
        assert!(doc.body.contains("#4"));
        assert!(doc.body.contains("S/ 18.00"));
        assert!(doc.body.contains("TOTAL PAID:"));
        assert!(!doc.body.contains("Advance payment"));
        assert!(doc.body.contains("Thank you for your payment."));
    }

    #[test]
    fn test_advance_receipt() {
        let doc = ReceiptFormatter::default()
            .format(&payment(20, PaymentType::Advance), &member(), &[])
            .unwrap();

        assert!(doc.body.contains("Advance payment - not applied to any outstanding debt"));
        assert!(!doc.body.contains("TOTAL PAID:"));
    }

    #[test]
    fn test_formatting_is_deterministic() {
        let formatter = ReceiptFormatter::new("River Club", "$", "txt");
        let allocations = vec![allocation(3, "50", &[("Monthly dues", "100", "50")])];

        let first = formatter.format(&payment(50, PaymentType::Normal), &member(), &allocations).unwrap();
        let second = formatter.format(&payment(50, PaymentType::Normal), &member(), &allocations).unwrap();
        assert_eq!(first, second);
        assert!(first.body.contains("River Club"));
        assert!(first.body.contains("$ 50.00"));
    }

    #[test]
    fn test_unsafe_file_name_is_render_failure() {
        let mut member = member();
        member.national_id = "../etc".to_string();

        let err = ReceiptFormatter::default()
            .format(&payment(20, PaymentType::Advance), &member, &[])
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::RenderFailure);
    }
}
