/// quick start - generate a month of dues and collect one payment
use sanda_billing_rs::{
    AllocationRequest, BillingEngine, BillingFrequency, Member, MemoryDirectory, Money,
    PaymentMeta, Uuid,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== quick start ===\n");

    let directory = Arc::new(MemoryDirectory::new());
    let member = Member {
        id: Uuid::new_v4(),
        name: "Ahmed Khan".to_string(),
        frequency: BillingFrequency::Monthly,
        amount_per_cycle: Money::from_major(1000),
        start_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        active: true,
    };
    let member_id = member.id;
    directory.insert(member);

    let engine = BillingEngine::builder().directory(directory).build();

    // bill the current month
    let report = engine.generate_current_period()?;
    println!(
        "generated {} invoices, skipped {}",
        report.generated, report.skipped
    );

    // member pays their dues
    let outcome = engine.allocate(&AllocationRequest {
        member_id,
        total_amount: Money::from_major(1000),
        meta: PaymentMeta::cash(),
    })?;
    for allocation in &outcome.allocations {
        println!(
            "applied {} to {} -> {:?}",
            allocation.amount_applied, allocation.period, allocation.resulting_status
        );
    }

    let arrears = engine.arrears_for(member_id)?;
    println!("\noutstanding after payment: {}", arrears.total_outstanding);

    Ok(())
}
