pub mod api;
pub mod club;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod interest;
pub mod models;
pub mod payments;
pub mod receipt;
pub mod statement;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

// re-export key types
pub use api::{AccessGate, Action, AllowAll, Api, ApiReply};
pub use club::{Club, RegisteredPayment};
pub use config::{AccrualMode, ClubConfig, InterestConfig, PaymentConfig, ReceiptConfig};
pub use decimal::{Money, Rate};
pub use errors::{DuesError, ErrorKind, Result};
pub use events::{Event, EventStore};
pub use interest::{AccrualEngine, AccrualReport, AccruedInterest, InterestCalculation, InterestPolicy};
pub use models::{AllocationEntry, Invoice, LineItem, Member, NewMember, Payment};
pub use payments::{
    AllocationEngine, InvoiceAllocation, ItemAllocation, PaymentHistory, PaymentOutcome,
    PaymentRequest,
};
pub use receipt::{FsReceiptStore, ReceiptDocument, ReceiptFormatter, ReceiptStore, StagedReceipt};
pub use statement::{AccountStatement, InvoiceStatement, MemberLookup, StatementBuilder, StatementItem};
pub use store::{FaultPoint, MemoryStore, Store, Transaction};
pub use types::{
    InvoiceId, InvoiceStatus, MemberId, MemberStatus, PaymentId, PaymentMethod, PaymentType,
    Settlement,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
