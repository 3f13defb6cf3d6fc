use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;

use crate::config::ClubConfig;
use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::events::{Event, EventStore};
use crate::interest::{AccrualEngine, AccrualReport, InterestPolicy};
use crate::models::{Invoice, Member, NewInvoice, NewMember};
use crate::payments::{self, AllocationEngine, PaymentHistory, PaymentOutcome, PaymentRequest};
use crate::receipt::{FsReceiptStore, ReceiptFormatter, ReceiptStore, StagedReceipt};
use crate::statement::{AccountStatement, MemberLookup, StatementBuilder};
use crate::store::{MemoryStore, Store, Transaction};
use crate::types::{MemberId, MemberStatus, PaymentId, PaymentMethod};

/// concept used for the base line item of an issued invoice
pub const DUES_CONCEPT: &str = "Monthly dues";

/// a committed payment and where its receipt ended up
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredPayment {
    pub outcome: PaymentOutcome,
    /// `None` when the receipt could not be published after commit
    pub receipt_path: Option<String>,
}

impl RegisteredPayment {
    pub fn message(&self) -> &'static str {
        self.outcome.message()
    }
}

/// club dues ledger
///
/// Every mutating operation runs in exactly one store transaction. Events
/// raised inside a transaction reach [`Club::events`] only once it commits.
pub struct Club<S: Store, R: ReceiptStore = FsReceiptStore> {
    pub config: ClubConfig,
    pub events: EventStore,
    store: S,
    receipts: R,
    accrual: AccrualEngine,
    allocation: AllocationEngine,
    statements: StatementBuilder,
    formatter: ReceiptFormatter,
}

impl Club<MemoryStore, FsReceiptStore> {
    /// in-memory ledger publishing receipts to the configured directory
    pub fn in_memory(config: ClubConfig) -> Result<Self> {
        let receipts = FsReceiptStore::from_config(&config.receipts);
        Self::new(config, MemoryStore::new(), receipts)
    }
}

impl<S: Store, R: ReceiptStore> Club<S, R> {
    pub fn new(config: ClubConfig, store: S, receipts: R) -> Result<Self> {
        config.validate()?;

        let policy = InterestPolicy::from_config(&config.interest);
        Ok(Self {
            accrual: AccrualEngine::new(policy.clone(), config.interest.accrual_mode),
            allocation: AllocationEngine::from_config(&config.payments),
            statements: StatementBuilder::new(policy),
            formatter: ReceiptFormatter::from_config(&config),
            events: EventStore::new(),
            config,
            store,
            receipts,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn receipts(&self) -> &R {
        &self.receipts
    }

    /// register member with system time
    pub fn register_member_now(&mut self, member: NewMember) -> Result<Member> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.register_member(member, &time)
    }

    /// register a new active member
    pub fn register_member(
        &mut self,
        member: NewMember,
        time_provider: &SafeTimeProvider,
    ) -> Result<Member> {
        let member = normalize_member(member)?;

        let mut tx = self.store.begin()?;
        let created = tx.insert_member(member)?;
        tx.commit()?;

        tracing::info!(member_id = created.id, national_id = %created.national_id, "member registered");
        self.events.emit(Event::MemberRegistered {
            member_id: created.id,
            national_id: created.national_id.clone(),
            timestamp: time_provider.now(),
        });

        Ok(created)
    }

    /// mark a member inactive; their history is kept
    pub fn deactivate_member(
        &mut self,
        member_id: MemberId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Member> {
        let mut tx = self.store.begin()?;
        let member = tx.set_member_status(member_id, MemberStatus::Inactive)?;
        tx.commit()?;

        tracing::info!(member_id, "member deactivated");
        self.events.emit(Event::MemberDeactivated {
            member_id,
            timestamp: time_provider.now(),
        });

        Ok(member)
    }

    /// all members ordered by name
    pub fn members(&self) -> Result<Vec<Member>> {
        let tx = self.store.begin()?;
        let members = tx.members()?;
        tx.rollback()?;
        Ok(members)
    }

    /// create an invoice carrying a single dues line item
    pub fn issue_invoice(
        &mut self,
        member_id: MemberId,
        base_amount: Money,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        concept: Option<&str>,
    ) -> Result<Invoice> {
        if base_amount.is_negative() {
            return Err(DuesError::InvalidAmount { amount: base_amount });
        }
        if due_date < issue_date {
            return Err(DuesError::InvalidInput {
                message: format!("due date {} precedes issue date {}", due_date, issue_date),
            });
        }

        let mut tx = self.store.begin()?;
        let invoice = tx.insert_invoice(NewInvoice {
            member_id,
            base_amount,
            issue_date,
            due_date,
        })?;
        tx.insert_line_item(invoice.id, concept.unwrap_or(DUES_CONCEPT), base_amount)?;
        tx.commit()?;

        tracing::info!(invoice_id = invoice.id, member_id, amount = %base_amount, "invoice issued");
        self.events.emit(Event::InvoiceIssued {
            invoice_id: invoice.id,
            member_id,
            amount: base_amount,
            due_date,
        });

        Ok(invoice)
    }

    /// statement with system time
    pub fn statement_now(&self, lookup: &MemberLookup) -> Result<AccountStatement> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.statement(lookup, &time)
    }

    /// current debt of an active member, including projected interest
    pub fn statement(
        &self,
        lookup: &MemberLookup,
        time_provider: &SafeTimeProvider,
    ) -> Result<AccountStatement> {
        self.statement_as_of(lookup, time_provider.now().date_naive())
    }

    pub fn statement_as_of(&self, lookup: &MemberLookup, as_of: NaiveDate) -> Result<AccountStatement> {
        let tx = self.store.begin()?;
        let statement = self.statements.build(&tx, lookup, as_of)?;
        tx.rollback()?;
        Ok(statement)
    }

    /// apply payment with system time
    pub fn apply_payment_now(
        &mut self,
        member_id: MemberId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<RegisteredPayment> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.apply_payment(member_id, amount, method, &time)
    }

    /// record a payment, allocate it and issue its receipt
    ///
    /// The receipt is staged before the transaction commits and published
    /// after. Any failure before commit rolls back the payment, its
    /// allocations and status changes, and discards the staged receipt.
    pub fn apply_payment(
        &mut self,
        member_id: MemberId,
        amount: Money,
        method: PaymentMethod,
        time_provider: &SafeTimeProvider,
    ) -> Result<RegisteredPayment> {
        let request = PaymentRequest::new(member_id, amount, method, time_provider.now());
        request.validate()?;

        let mut pending = EventStore::new();
        let mut tx = self.store.begin()?;

        let outcome = match self.allocation.allocate(&mut tx, &request, &mut pending) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(member_id, amount = %amount, error = %e, "payment rolled back");
                return Err(e);
            }
        };

        let staged = match self
            .formatter
            .format(&outcome.payment, &outcome.member, &outcome.allocations)
            .and_then(|document| self.receipts.stage(&document))
        {
            Ok(staged) => staged,
            Err(e) => {
                tracing::error!(member_id, error = %e, "receipt could not be rendered, payment rolled back");
                return Err(e);
            }
        };

        if let Err(e) = tx.commit() {
            tracing::error!(member_id, error = %e, "payment commit failed");
            discard_staged(&self.receipts, staged);
            return Err(e);
        }

        let receipt_path = match self.receipts.publish(staged) {
            Ok(path) => {
                pending.emit(Event::ReceiptIssued {
                    payment_id: outcome.payment.id,
                    receipt_number: outcome.payment.receipt_number.clone(),
                    path: path.clone(),
                });
                Some(path)
            }
            Err(e) => {
                tracing::warn!(
                    payment_id = outcome.payment.id,
                    receipt_number = %outcome.payment.receipt_number,
                    error = %e,
                    "payment committed but receipt was not published"
                );
                None
            }
        };

        tracing::info!(
            payment_id = outcome.payment.id,
            member_id,
            amount = %amount,
            applied = %outcome.applied,
            unapplied = %outcome.unapplied,
            invoices = outcome.allocations.len(),
            settlement = ?outcome.settlement,
            "payment registered"
        );
        self.events.absorb(&mut pending);

        Ok(RegisteredPayment { outcome, receipt_path })
    }

    /// accrue interest with system time
    pub fn accrue_interest_now(&mut self) -> Result<AccrualReport> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.accrue_interest(&time)
    }

    /// persist late interest for every overdue invoice, all or nothing
    pub fn accrue_interest(&mut self, time_provider: &SafeTimeProvider) -> Result<AccrualReport> {
        self.accrue_interest_as_of(time_provider.now().date_naive())
    }

    pub fn accrue_interest_as_of(&mut self, as_of: NaiveDate) -> Result<AccrualReport> {
        let mut pending = EventStore::new();
        let mut tx = self.store.begin()?;

        let report = match self.accrual.accrue(&mut tx, as_of, &mut pending) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(%as_of, error = %e, "interest accrual rolled back");
                return Err(e);
            }
        };
        tx.commit()?;

        tracing::info!(
            %as_of,
            scanned = report.invoices_scanned,
            added = report.items_added(),
            skipped = report.skipped_existing,
            total = %report.total_interest(),
            "interest accrual completed"
        );
        self.events.absorb(&mut pending);

        Ok(report)
    }

    /// a stored payment and its allocation entries
    pub fn payment_history(&self, payment_id: PaymentId) -> Result<PaymentHistory> {
        let tx = self.store.begin()?;
        let history = payments::payment_history(&tx, payment_id)?;
        tx.rollback()?;
        Ok(history)
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }
}

fn normalize_member(member: NewMember) -> Result<NewMember> {
    let national_id = member.national_id.trim().to_string();
    let name = member.name.trim().to_string();
    if national_id.is_empty() {
        return Err(DuesError::InvalidInput {
            message: "national id is required".to_string(),
        });
    }
    if name.is_empty() {
        return Err(DuesError::InvalidInput {
            message: "name is required".to_string(),
        });
    }

    Ok(NewMember {
        national_id,
        name,
        phone: member.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        category: member
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    })
}

fn discard_staged<R: ReceiptStore>(receipts: &R, staged: StagedReceipt) {
    if let Err(e) = receipts.discard(staged) {
        tracing::warn!(error = %e, "staged receipt could not be discarded");
    }
}
