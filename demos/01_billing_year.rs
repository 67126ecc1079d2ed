/// billing year - controlled time, mixed cadences, arrears aging
use chrono::{NaiveDate, TimeZone, Utc};
use sanda_billing_rs::{
    AllocationRequest, BillingEngine, BillingFrequency, Member, MemoryDirectory, Money,
    PaymentMeta, Period, TimeSource, Uuid,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== billing year ===\n");

    let directory = Arc::new(MemoryDirectory::new());
    let monthly = Member {
        id: Uuid::new_v4(),
        name: "Ahmed Khan".to_string(),
        frequency: BillingFrequency::Monthly,
        amount_per_cycle: Money::from_major(500),
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        active: true,
    };
    // joined mid-quarter: bills on their own quarter boundary
    let quarterly = Member {
        id: Uuid::new_v4(),
        name: "Bilal Hussain".to_string(),
        frequency: BillingFrequency::Quarterly,
        amount_per_cycle: Money::from_major(1500),
        start_date: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
        active: true,
    };
    let monthly_id = monthly.id;
    directory.insert(monthly);
    directory.insert(quarterly);

    let engine = BillingEngine::builder()
        .directory(directory)
        .time_source(TimeSource::Test(
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        ))
        .build();

    // run the generator for each month of the half-year
    for month in 1..=6u32 {
        let period = Period::new(2025, month)?;
        let report = engine.generate_for_period(period)?;
        println!(
            "{}: generated {}, skipped {}",
            period, report.generated, report.skipped
        );
    }

    // the monthly member pays two and a half months
    engine.allocate(&AllocationRequest {
        member_id: monthly_id,
        total_amount: Money::from_major(1250),
        meta: PaymentMeta::cash(),
    })?;

    println!("\noutstanding members, worst first:");
    for summary in engine.arrears_for_all()? {
        println!(
            "  member {} owes {} across {} periods",
            summary.member_id,
            summary.total_outstanding,
            summary.periods_behind()
        );
        for balance in &summary.unpaid_periods {
            println!(
                "    {} due {} outstanding {}",
                balance.period, balance.due_date, balance.outstanding
            );
        }
    }

    Ok(())
}
