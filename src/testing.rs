//! shared fixtures for unit tests

use chrono::NaiveDate;

use crate::decimal::Money;
use crate::models::{Invoice, Member, NewInvoice, NewMember};
use crate::store::Transaction;
use crate::types::MemberId;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn seed_member<T: Transaction>(tx: &mut T, national_id: &str, name: &str) -> Member {
    tx.insert_member(NewMember::new(national_id, name)).unwrap()
}

/// invoice with a single dues line item equal to its base amount
pub fn seed_invoice<T: Transaction>(tx: &mut T, member_id: MemberId, base: i64, due: NaiveDate) -> Invoice {
    let invoice = tx
        .insert_invoice(NewInvoice {
            member_id,
            base_amount: Money::from_major(base),
            issue_date: due - chrono::Duration::days(15),
            due_date: due,
        })
        .unwrap();
    tx.insert_line_item(invoice.id, "Monthly dues", Money::from_major(base))
        .unwrap();
    invoice
}
