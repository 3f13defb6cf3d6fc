use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DuesError;

/// row identifiers, assigned by the store
pub type MemberId = u64;
pub type InvoiceId = u64;
pub type LineItemId = u64;
pub type PaymentId = u64;
pub type AllocationId = u64;

/// member lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
}

/// invoice settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// nothing applied yet
    Pending,
    /// some payment applied, balance above tolerance
    Partial,
    /// balance within tolerance of zero
    Paid,
}

impl InvoiceStatus {
    /// still counts towards the member's debt
    pub fn is_open(&self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Partial)
    }
}

/// payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Card,
    Deposit,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::Deposit => "deposit",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DuesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "transfer" | "bank_transfer" => Ok(PaymentMethod::Transfer),
            "card" | "credit_card" | "debit_card" => Ok(PaymentMethod::Card),
            "deposit" => Ok(PaymentMethod::Deposit),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(DuesError::UnknownPaymentMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// payment classification at the time it was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// member had outstanding debt
    Normal,
    /// member owed nothing
    Advance,
}

/// how far a payment got in settling the member's debt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// every open invoice ended paid
    FullySettled,
    /// some debt remains
    PartiallySettled,
    /// nothing was owed
    Advance,
}

impl Settlement {
    pub fn message(&self) -> &'static str {
        match self {
            Settlement::FullySettled => "Payment registered - debt fully settled",
            Settlement::PartiallySettled => "Payment registered - debt partially settled",
            Settlement::Advance => "Payment registered as an advance",
        }
    }
}
