//! request layer
//!
//! Thin handlers that translate JSON-shaped requests into [`Club`] calls and
//! wrap the answers in a `{ success, message, ... }` envelope. Business
//! failures are reported to the caller; anything else becomes a server error
//! with a generic message and is logged.

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::club::Club;
use crate::decimal::Money;
use crate::errors::DuesError;
use crate::models::{Member, NewMember};
use crate::receipt::ReceiptStore;
use crate::statement::{AccountStatement, MemberLookup};
use crate::store::Store;
use crate::types::{MemberId, MemberStatus, PaymentMethod};

pub const SERVER_ERROR_MESSAGE: &str = "Internal server error";
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// operations a request may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewStatement,
    RegisterPayment,
    RegisterMember,
    ListMembers,
}

/// authorization decision made outside this crate
pub trait AccessGate {
    fn allows(&self, action: Action) -> bool;
}

/// gate that lets every request through
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn allows(&self, _action: Action) -> bool {
        true
    }
}

/// response envelope; `data` fields are flattened next to `success`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReply<T> {
    #[serde(skip)]
    pub status: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> ApiReply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: 200,
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::failure(401, UNAUTHORIZED_MESSAGE)
    }

    /// business errors are a normal `success: false` reply; everything else is hidden
    pub fn from_error(error: &DuesError) -> Self {
        if error.kind().is_business() {
            return Self::failure(200, error.to_string());
        }
        tracing::error!(error = %error, kind = ?error.kind(), "request failed");
        Self::failure(500, SERVER_ERROR_MESSAGE)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

// ---- request bodies ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementQuery {
    pub national_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
    pub member_id: MemberId,
    pub amount: Money,
    pub method: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberBody {
    pub national_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

// ---- response bodies ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub id: MemberId,
    pub national_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub category: String,
}

impl From<&Member> for MemberDto {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            national_id: member.national_id.clone(),
            name: member.name.clone(),
            phone: member.phone.clone(),
            category: member.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDto {
    pub concept: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDto {
    pub id: u64,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<ItemDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementBody {
    pub member: MemberDto,
    pub total_debt: String,
    pub invoices: Vec<InvoiceDto>,
}

impl From<&AccountStatement> for StatementBody {
    fn from(statement: &AccountStatement) -> Self {
        Self {
            member: MemberDto::from(&statement.member),
            total_debt: statement.total_debt.to_fixed(),
            invoices: statement
                .invoices
                .iter()
                .map(|invoice| InvoiceDto {
                    id: invoice.id,
                    issue_date: invoice.issue_date,
                    due_date: invoice.due_date,
                    items: invoice
                        .items
                        .iter()
                        .map(|item| ItemDto {
                            concept: item.concept.clone(),
                            amount: item.amount.to_fixed(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReply {
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberReply {
    pub member: MemberDto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberListEntry {
    #[serde(flatten)]
    pub member: MemberDto,
    pub status: MemberStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberList {
    pub members: Vec<MemberListEntry>,
}

/// request handlers bound to one club and one access gate
pub struct Api<S: Store, R: ReceiptStore, G: AccessGate = AllowAll> {
    club: Club<S, R>,
    gate: G,
}

impl<S: Store, R: ReceiptStore, G: AccessGate> Api<S, R, G> {
    pub fn new(club: Club<S, R>, gate: G) -> Self {
        Self { club, gate }
    }

    pub fn club(&self) -> &Club<S, R> {
        &self.club
    }

    pub fn club_mut(&mut self) -> &mut Club<S, R> {
        &mut self.club
    }

    pub fn statement(
        &self,
        query: &StatementQuery,
        time_provider: &SafeTimeProvider,
    ) -> ApiReply<StatementBody> {
        if !self.gate.allows(Action::ViewStatement) {
            return ApiReply::unauthorized();
        }

        let national_id = query.national_id.trim();
        if national_id.is_empty() {
            return ApiReply::failure(200, "national id is required");
        }

        let lookup = MemberLookup::NationalId(national_id.to_string());
        match self.club.statement(&lookup, time_provider) {
            Ok(statement) => ApiReply::ok(StatementBody::from(&statement)),
            Err(DuesError::MemberInactive { national_id }) => {
                // inactive members are reported the same as unknown ones
                ApiReply::from_error(&DuesError::MemberNotFound { key: national_id })
            }
            Err(e) => ApiReply::from_error(&e),
        }
    }

    pub fn register_payment(
        &mut self,
        body: &PaymentBody,
        time_provider: &SafeTimeProvider,
    ) -> ApiReply<PaymentReply> {
        if !self.gate.allows(Action::RegisterPayment) {
            return ApiReply::unauthorized();
        }

        let method = match body.method.parse::<PaymentMethod>() {
            Ok(method) => method,
            Err(e) => return ApiReply::from_error(&e),
        };
        match self.club.apply_payment(body.member_id, body.amount, method, time_provider) {
            Ok(paid) => ApiReply::ok_with_message(
                PaymentReply {
                    receipt_url: paid.receipt_path.clone(),
                },
                paid.message(),
            ),
            Err(e) => ApiReply::from_error(&e),
        }
    }

    pub fn register_member(
        &mut self,
        body: &MemberBody,
        time_provider: &SafeTimeProvider,
    ) -> ApiReply<MemberReply> {
        if !self.gate.allows(Action::RegisterMember) {
            return ApiReply::unauthorized();
        }

        let new_member = NewMember {
            national_id: body.national_id.clone(),
            name: body.name.clone(),
            phone: body.phone.clone(),
            category: body.category.clone(),
        };

        match self.club.register_member(new_member, time_provider) {
            Ok(member) => ApiReply::ok_with_message(
                MemberReply {
                    member: MemberDto::from(&member),
                },
                "Member registered",
            ),
            Err(e) => ApiReply::from_error(&e),
        }
    }

    pub fn list_members(&self) -> ApiReply<MemberList> {
        if !self.gate.allows(Action::ListMembers) {
            return ApiReply::unauthorized();
        }

        match self.club.members() {
            Ok(members) => ApiReply::ok(MemberList {
                members: members
                    .iter()
                    .map(|member| MemberListEntry {
                        member: MemberDto::from(member),
                        status: member.status,
                    })
                    .collect(),
            }),
            Err(e) => ApiReply::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClubConfig;
    use crate::receipt::FsReceiptStore;
    use crate::store::{FaultPoint, MemoryStore};
    use crate::testing::date;
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use serde_json::{json, Value};

    struct DenyAll;

    impl AccessGate for DenyAll {
        fn allows(&self, _action: Action) -> bool {
            false
        }
    }

    fn clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        ))
    }

    fn api(dir: &std::path::Path) -> Api<MemoryStore, FsReceiptStore> {
        let club = Club::in_memory(ClubConfig::default().with_receipt_directory(dir)).unwrap();
        Api::new(club, AllowAll)
    }

    fn member_body(value: Value) -> MemberBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_statement_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let time = clock();
        let mut api = api(dir.path());

        let reply = api.register_member(
            &member_body(json!({"nationalId": "100", "name": "Doe", "phone": "555-0100"})),
            &time,
        );
        let member_id = reply.data.unwrap().member.id;
        api.club_mut()
            .issue_invoice(member_id, Money::from_major(100), date(2024, 1, 15), date(2024, 1, 30), None)
            .unwrap();

        let reply = api.statement(&StatementQuery { national_id: "100".to_string() }, &time);
        let value = serde_json::to_value(&reply).unwrap();

        assert_eq!(value["success"], json!(true));
        assert_eq!(value["member"]["nationalId"], json!("100"));
        assert_eq!(value["member"]["category"], json!("Ordinary"));
        assert_eq!(value["totalDebt"], json!("102.00"));
        assert_eq!(value["invoices"][0]["dueDate"], json!("2024-01-30"));
        assert_eq!(value["invoices"][0]["issueDate"], json!("2024-01-15"));
        assert_eq!(value["invoices"][0]["items"][1]["concept"], json!("Late interest (2% monthly)"));
        assert_eq!(value["invoices"][0]["items"][1]["amount"], json!("2.00"));
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_unknown_member_statement() {
        let dir = tempfile::tempdir().unwrap();
        let api = api(dir.path());

        let reply = api.statement(&StatementQuery { national_id: "999".to_string() }, &clock());
        assert_eq!(reply.status, 200);
        assert!(!reply.is_server_error());
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["success"], json!(false));
        assert!(value["message"].as_str().unwrap().contains("999"));
    }

    #[test]
    fn test_payment_registration() {
        let dir = tempfile::tempdir().unwrap();
        let time = clock();
        let mut api = api(dir.path());
        let member_id = api
            .register_member(&member_body(json!({"nationalId": "200", "name": "Roe"})), &time)
            .data
            .unwrap()
            .member
            .id;

        let body: PaymentBody =
            serde_json::from_value(json!({"memberId": member_id, "amount": "20.00", "method": "Cash"}))
                .unwrap();
        let reply = api.register_payment(&body, &time);
        let value = serde_json::to_value(&reply).unwrap();

        assert_eq!(value["success"], json!(true));
        assert_eq!(value["message"], json!("Payment registered as an advance"));
        let url = value["receiptUrl"].as_str().unwrap();
        assert!(url.starts_with("/receipts/receipt_REC-"));
        assert!(url.ends_with("_200.txt"));
    }

    #[test]
    fn test_payment_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let time = clock();
        let mut api = api(dir.path());

        let bad_method: PaymentBody =
            serde_json::from_value(json!({"memberId": 1, "amount": 10, "method": "barter"})).unwrap();
        let reply = api.register_payment(&bad_method, &time);
        assert_eq!(reply.status, 200);
        assert!(!reply.success);

        let bad_amount: PaymentBody =
            serde_json::from_value(json!({"memberId": 1, "amount": "0", "method": "cash"})).unwrap();
        let reply = api.register_payment(&bad_amount, &time);
        assert_eq!(reply.status, 200);
        assert!(!reply.success);
        assert!(reply.message.unwrap().contains("invalid payment amount"));
    }

    #[test]
    fn test_transaction_failure_is_generic_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let time = clock();
        let mut api = api(dir.path());
        let member_id = api
            .register_member(&member_body(json!({"nationalId": "300", "name": "Moe"})), &time)
            .data
            .unwrap()
            .member
            .id;

        api.club().store().fail_on(FaultPoint::InsertPayment, 0);
        let body: PaymentBody =
            serde_json::from_value(json!({"memberId": member_id, "amount": "15", "method": "card"})).unwrap();
        let reply = api.register_payment(&body, &time);

        assert_eq!(reply.status, 500);
        assert!(reply.is_server_error());
        assert_eq!(reply.message.as_deref(), Some(SERVER_ERROR_MESSAGE));
    }

    #[test]
    fn test_member_registration_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let time = clock();
        let mut api = api(dir.path());

        let reply = api.register_member(
            &member_body(json!({"nationalId": "100", "name": "Zed", "category": "Honorary"})),
            &time,
        );
        assert!(reply.success);
        assert_eq!(reply.data.as_ref().unwrap().member.category, "Honorary");

        let duplicate = api.register_member(&member_body(json!({"nationalId": "100", "name": "Other"})), &time);
        assert_eq!(duplicate.status, 200);
        assert!(!duplicate.success);
        assert!(duplicate.message.unwrap().contains("already exists"));

        api.register_member(&member_body(json!({"nationalId": "101", "name": "Amy"})), &time);
        let value = serde_json::to_value(api.list_members()).unwrap();
        assert_eq!(value["members"][0]["name"], json!("Amy"));
        assert_eq!(value["members"][1]["name"], json!("Zed"));
        assert_eq!(value["members"][1]["status"], json!("active"));
    }

    #[test]
    fn test_gate_denies() {
        let dir = tempfile::tempdir().unwrap();
        let club = Club::in_memory(ClubConfig::default().with_receipt_directory(dir.path())).unwrap();
        let api = Api::new(club, DenyAll);

        let reply = api.list_members();
        assert_eq!(reply.status, 401);
        assert_eq!(reply.message.as_deref(), Some(UNAUTHORIZED_MESSAGE));
    }
}
