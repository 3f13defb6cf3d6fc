/// quick start - register a member, bill them, take a payment
use club_dues_rs::chrono::NaiveDate;
use club_dues_rs::{Club, ClubConfig, MemberLookup, Money, NewMember, PaymentMethod};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let receipts = std::env::temp_dir().join("club-dues-quick-start");
    let mut club = Club::in_memory(ClubConfig::default().with_receipt_directory(&receipts))?;

    // register a member and issue one month of dues
    let member = club.register_member_now(NewMember::new("12345678", "Jane Doe").phone("555-0100"))?;
    let issued = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("bad date")?;
    let due = NaiveDate::from_ymd_opt(2024, 1, 15).ok_or("bad date")?;
    club.issue_invoice(member.id, Money::from_major(100), issued, due, None)?;

    // what does she owe today?
    let statement = club.statement_now(&MemberLookup::NationalId(member.national_id.clone()))?;
    println!("total debt: {}", statement.total_debt);

    // pay part of it
    let paid = club.apply_payment_now(member.id, Money::from_major(60), PaymentMethod::Cash)?;
    println!("{}", paid.message());
    if let Some(path) = &paid.receipt_path {
        println!("receipt: {} (written under {})", path, receipts.display());
    }

    Ok(())
}
