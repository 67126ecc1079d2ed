/// bulk collection - settle a payment-matrix submission in one call
use chrono::NaiveDate;
use sanda_billing_rs::{
    BillingEngine, BillingFrequency, Member, MemoryDirectory, Money, PaymentMeta, Period,
    Selection, Uuid,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== bulk collection ===\n");

    let directory = Arc::new(MemoryDirectory::new());
    let mut member_ids = Vec::new();
    for name in ["Ahmed Khan", "Bilal Hussain", "Dawud Patel"] {
        let member = Member {
            id: Uuid::new_v4(),
            name: name.to_string(),
            frequency: BillingFrequency::Monthly,
            amount_per_cycle: Money::from_major(1000),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            active: true,
        };
        member_ids.push(member.id);
        directory.insert(member);
    }

    let engine = BillingEngine::builder().directory(directory).build();
    let jan = Period::new(2025, 1)?;
    let feb = Period::new(2025, 2)?;
    engine.generate_for_period(jan)?;
    engine.generate_for_period(feb)?;

    // the treasurer ticks cells in the matrix: two months for the first
    // member, one each for the rest, plus one cell that was never billed
    let mut selections = vec![
        Selection { member_id: member_ids[0], period: jan },
        Selection { member_id: member_ids[0], period: feb },
        Selection { member_id: member_ids[1], period: jan },
        Selection { member_id: member_ids[2], period: feb },
    ];
    selections.push(Selection {
        member_id: member_ids[2],
        period: Period::new(2025, 9)?,
    });

    let report = engine.bulk_allocate(&selections, PaymentMeta::cash());

    println!("collected {} in total\n", report.collected_total());
    for receipt in &report.receipts {
        println!("receipt {}:", receipt.receipt_no);
        println!("{}\n", receipt.json());
    }
    for failure in &report.failures {
        println!(
            "failed: member {} period {} ({})",
            failure.member_id, failure.period, failure.reason
        );
    }

    Ok(())
}
