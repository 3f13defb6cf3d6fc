/// monthly accrual - run interest accrual against a controlled clock
use chrono::{Duration, TimeZone, Utc};
use club_dues_rs::{
    AccrualMode, Club, ClubConfig, MemberLookup, Money, NewMember, PaymentMethod, SafeTimeProvider,
    TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== monthly accrual example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let mut config = ClubConfig::default()
        .with_receipt_directory(std::env::temp_dir().join("club-dues-accrual"));
    config.interest.accrual_mode = AccrualMode::Incremental;
    let mut club = Club::in_memory(config)?;

    let member = club.register_member(NewMember::new("87654321", "John Roe"), &time)?;
    let today = time.now().date_naive();
    club.issue_invoice(member.id, Money::from_major(80), today, today + Duration::days(14), None)?;

    // run the accrual on the first of each month
    for _ in 0..4 {
        controller.advance(Duration::days(31));
        let report = club.accrue_interest(&time)?;
        println!(
            "{}: scanned {} invoice(s), added {} item(s), interest {}",
            report.as_of,
            report.invoices_scanned,
            report.items_added(),
            report.total_interest()
        );
    }

    let statement = club.statement(&MemberLookup::Id(member.id), &time)?;
    for invoice in &statement.invoices {
        for item in &invoice.items {
            println!("  #{} {:<36} {}", invoice.id, item.concept, item.amount);
        }
    }
    println!("total debt: {}", statement.total_debt);

    // settle everything
    let paid = club.apply_payment(member.id, statement.total_debt, PaymentMethod::Transfer, &time)?;
    println!("\n{}", paid.message());

    for event in club.take_events() {
        println!("{:?}", event);
    }

    Ok(())
}
