use thiserror::Error;

use crate::decimal::{Money, Rate};
use crate::types::{InvoiceId, PaymentId};

/// coarse classification used by the request layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    ConflictOrIntegrity,
    TransactionFailure,
    RenderFailure,
}

impl ErrorKind {
    /// business-rule failures are answered with a `success: false` envelope
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::InvalidInput | ErrorKind::ConflictOrIntegrity
        )
    }
}

#[derive(Error, Debug)]
pub enum DuesError {
    #[error("member not found: {key}")]
    MemberNotFound {
        key: String,
    },

    #[error("member is inactive: {national_id}")]
    MemberInactive {
        national_id: String,
    },

    #[error("invoice not found: {id}")]
    InvoiceNotFound {
        id: InvoiceId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
    },

    #[error("unknown payment method: {method}")]
    UnknownPaymentMethod {
        method: String,
    },

    #[error("a member with national id {national_id} already exists")]
    DuplicateNationalId {
        national_id: String,
    },

    #[error("duplicate receipt number: {receipt_number}")]
    DuplicateReceiptNumber {
        receipt_number: String,
    },

    #[error("invoice {id} was modified concurrently: expected version {expected}, found {found}")]
    ConcurrentModification {
        id: InvoiceId,
        expected: u64,
        found: u64,
    },

    #[error("invalid interest rate: {rate}")]
    InvalidInterestRate {
        rate: Rate,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("transaction failed: {message}")]
    Transaction {
        message: String,
    },

    #[error("receipt rendering failed: {message}")]
    Render {
        message: String,
    },

    #[error("receipt storage error: {0}")]
    ReceiptIo(#[from] std::io::Error),
}

impl DuesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DuesError::MemberNotFound { .. }
            | DuesError::MemberInactive { .. }
            | DuesError::InvoiceNotFound { .. }
            | DuesError::PaymentNotFound { .. } => ErrorKind::NotFound,
            DuesError::InvalidAmount { .. }
            | DuesError::InvalidInput { .. }
            | DuesError::UnknownPaymentMethod { .. } => ErrorKind::InvalidInput,
            DuesError::DuplicateNationalId { .. } => ErrorKind::ConflictOrIntegrity,
            DuesError::DuplicateReceiptNumber { .. }
            | DuesError::ConcurrentModification { .. }
            | DuesError::InvalidInterestRate { .. }
            | DuesError::InvalidConfiguration { .. }
            | DuesError::Transaction { .. } => ErrorKind::TransactionFailure,
            DuesError::Render { .. } | DuesError::ReceiptIo(_) => ErrorKind::RenderFailure,
        }
    }

    pub(crate) fn transaction(message: impl Into<String>) -> Self {
        DuesError::Transaction {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DuesError>;
