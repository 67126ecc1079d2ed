use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AdvancePolicy, BillingConfig};
use crate::errors::{BillingError, Result};
use crate::events::{Event, EventStore};
use crate::invoice::{Invoice, Payment};
use crate::lock::MemberLocks;
use crate::member::Member;
use crate::period::{Period, PeriodCalendar};
use crate::receipt::ReceiptSequence;
use crate::store::{InvoiceStore, StoreTxn};
use crate::types::{MemberId, PaymentMethod};

/// one member the generator could not invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub member_id: MemberId,
    pub reason: String,
}

/// outcome of one generation run
///
/// Partial completion is a valid outcome: failures are collected, never
/// thrown, and everything committed before a failure stays committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub period: Period,
    pub generated: u32,
    pub skipped: u32,
    pub failures: Vec<GenerationFailure>,
}

/// creates one invoice per eligible active member for a target period
pub struct InvoiceGenerator<'a> {
    store: &'a dyn InvoiceStore,
    receipts: &'a dyn ReceiptSequence,
    locks: &'a MemberLocks,
    config: &'a BillingConfig,
    calendar: PeriodCalendar,
}

impl<'a> InvoiceGenerator<'a> {
    pub fn new(
        store: &'a dyn InvoiceStore,
        receipts: &'a dyn ReceiptSequence,
        locks: &'a MemberLocks,
        config: &'a BillingConfig,
    ) -> Self {
        Self {
            store,
            receipts,
            locks,
            config,
            calendar: PeriodCalendar::new(config.due_date_policy),
        }
    }

    /// generate invoices for every eligible member in the target period
    ///
    /// Idempotent: members already invoiced for the period are skipped, so a
    /// second run for the same period generates nothing. A member whose
    /// cadence does not bill in the period, or who is inactive, is also
    /// skipped.
    pub fn generate_for_period(
        &self,
        members: &[Member],
        period: Period,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> GenerationReport {
        let mut report = GenerationReport {
            period,
            generated: 0,
            skipped: 0,
            failures: Vec::new(),
        };

        for member in members {
            if !member.active || !self.calendar.bills_in(member, period) {
                report.skipped += 1;
                continue;
            }

            match self.generate_one(member, period, now, events) {
                Ok(true) => report.generated += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(member = %member.id, period = %period, error = %e, "invoice generation failed");
                    report.failures.push(GenerationFailure {
                        member_id: member.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            period = %period,
            generated = report.generated,
            skipped = report.skipped,
            failed = report.failures.len(),
            "generation run completed"
        );
        events.emit(Event::GenerationCompleted {
            period,
            generated: report.generated,
            skipped: report.skipped,
            failed: report.failures.len() as u32,
            timestamp: now,
        });
        report
    }

    /// returns Ok(true) when an invoice was created, Ok(false) when skipped
    fn generate_one(
        &self,
        member: &Member,
        period: Period,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<bool> {
        self.locks
            .with_member(member.id, self.config.lock_timeout, || {
                if self
                    .store
                    .invoice_for_period(member.id, period)?
                    .is_some()
                {
                    return Ok(false);
                }

                let due_date = self.calendar.due_date(member, period);
                let mut invoice =
                    Invoice::new(member.id, period, member.amount_per_cycle, due_date, now);

                let mut txn = StoreTxn::default();
                let mut pending_events = vec![Event::InvoiceGenerated {
                    invoice_id: invoice.id,
                    member_id: member.id,
                    period,
                    amount_due: invoice.amount_due,
                    due_date,
                }];

                if self.config.advance_policy == AdvancePolicy::CreditNextInvoice {
                    let credit = self.store.credit_balance(member.id)?;
                    if credit.is_positive() {
                        let applied = credit.min(invoice.amount_due);
                        invoice.apply_payment(applied)?;
                        let leftover = credit - applied;
                        txn.insert_payments.push(Payment::new(
                            invoice.id,
                            applied,
                            PaymentMethod::Advance,
                            None,
                            now,
                            self.receipts.next_receipt_no(),
                        ));
                        txn.set_credit = Some((member.id, leftover));
                        pending_events.push(Event::CreditApplied {
                            member_id: member.id,
                            invoice_id: invoice.id,
                            amount: applied,
                            remaining_credit: leftover,
                            timestamp: now,
                        });
                        if invoice.is_settled() {
                            pending_events.push(Event::InvoiceSettled {
                                invoice_id: invoice.id,
                                member_id: member.id,
                                period,
                                timestamp: now,
                            });
                        }
                    }
                }

                txn.insert_invoices.push(invoice.clone());
                match self.store.commit(txn) {
                    Ok(()) => {
                        debug!(member = %member.id, period = %period, amount = %invoice.amount_due, "invoice generated");
                        for event in pending_events {
                            events.emit(event);
                        }
                        Ok(true)
                    }
                    // a concurrent run won the insert; same outcome as the
                    // existence check above
                    Err(BillingError::DuplicateInvoice { .. }) => Ok(false),
                    Err(e) => Err(e),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::member::{MemberDirectory, MemoryDirectory};
    use crate::receipt::SequentialReceipts;
    use crate::store::MemoryStore;
    use crate::types::BillingFrequency;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn member(name: &str, frequency: BillingFrequency, start: (i32, u32, u32)) -> Member {
        Member {
            id: Uuid::new_v4(),
            name: name.to_string(),
            frequency,
            amount_per_cycle: Money::from_major(1000),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            active: true,
        }
    }

    struct Fixture {
        store: MemoryStore,
        receipts: SequentialReceipts,
        locks: MemberLocks,
        config: BillingConfig,
    }

    impl Fixture {
        fn new(config: BillingConfig) -> Self {
            Self {
                store: MemoryStore::new(),
                receipts: SequentialReceipts::new("SND"),
                locks: MemberLocks::new(),
                config,
            }
        }

        fn run(&self, members: &[Member], period: &str) -> GenerationReport {
            let generator =
                InvoiceGenerator::new(&self.store, &self.receipts, &self.locks, &self.config);
            let now = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
            let mut events = EventStore::new();
            generator.generate_for_period(members, period.parse().unwrap(), now, &mut events)
        }
    }

    #[test]
    fn test_generation_is_idempotent() {
        let fixture = Fixture::new(BillingConfig::default());
        let members = vec![
            member("Ahmed", BillingFrequency::Monthly, (2024, 6, 1)),
            member("Bilal", BillingFrequency::Monthly, (2024, 11, 10)),
        ];

        let first = fixture.run(&members, "2025-01");
        assert_eq!(first.generated, 2);
        assert_eq!(first.skipped, 0);
        assert!(first.failures.is_empty());

        let second = fixture.run(&members, "2025-01");
        assert_eq!(second.generated, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(fixture.store.invoice_count(), 2);
    }

    #[test]
    fn test_inactive_and_off_cycle_members_skipped() {
        let fixture = Fixture::new(BillingConfig::default());
        let mut inactive = member("Ahmed", BillingFrequency::Monthly, (2024, 6, 1));
        inactive.active = false;
        // quarterly anchored at 2024-11: bills 2024-11, 2025-02, not 2025-01
        let off_cycle = member("Bilal", BillingFrequency::Quarterly, (2024, 11, 5));
        // not yet started
        let future = member("Dawud", BillingFrequency::Monthly, (2025, 3, 1));

        let report = fixture.run(&[inactive, off_cycle, future], "2025-01");
        assert_eq!(report.generated, 0);
        assert_eq!(report.skipped, 3);
    }

    #[test]
    fn test_first_invoice_needs_no_prior_history() {
        let fixture = Fixture::new(BillingConfig::default());
        let m = member("Ahmed", BillingFrequency::Monthly, (2025, 1, 20));

        let report = fixture.run(std::slice::from_ref(&m), "2025-01");
        assert_eq!(report.generated, 1);

        let invoice = fixture
            .store
            .invoice_for_period(m.id, "2025-01".parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(invoice.amount_due, Money::from_major(1000));
        assert_eq!(invoice.amount_paid, Money::ZERO);
        // default policy: due at period start
        assert_eq!(
            invoice.due_date,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_one_failure_does_not_abort_batch() {
        let fixture = Fixture::new(BillingConfig::default());
        let blocked = member("Ahmed", BillingFrequency::Monthly, (2024, 6, 1));
        let fine = member("Bilal", BillingFrequency::Monthly, (2024, 6, 1));

        // hold the first member's lock so their generation times out
        let config = BillingConfig::default()
            .with_lock_timeout(std::time::Duration::from_millis(20));
        let fixture = Fixture { config, ..fixture };

        let blocked_id = blocked.id;
        let members = vec![blocked, fine];
        let lock_ref = &fixture.locks;
        std::thread::scope(|scope| {
            let holder = scope.spawn(move || {
                lock_ref
                    .with_member(blocked_id, std::time::Duration::from_secs(1), || {
                        std::thread::sleep(std::time::Duration::from_millis(200));
                        Ok(())
                    })
                    .unwrap();
            });
            // give the holder time to take the lock
            std::thread::sleep(std::time::Duration::from_millis(50));

            let report = fixture.run(&members, "2025-01");
            assert_eq!(report.generated, 1);
            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].member_id, blocked_id);

            holder.join().unwrap();
        });
    }

    #[test]
    fn test_credit_drained_into_generated_invoice() {
        let config =
            BillingConfig::default().with_advance_policy(AdvancePolicy::CreditNextInvoice);
        let fixture = Fixture::new(config);
        let m = member("Ahmed", BillingFrequency::Monthly, (2024, 6, 1));

        fixture
            .store
            .commit(StoreTxn {
                set_credit: Some((m.id, Money::from_major(300))),
                ..StoreTxn::default()
            })
            .unwrap();

        let report = fixture.run(std::slice::from_ref(&m), "2025-01");
        assert_eq!(report.generated, 1);

        let invoice = fixture
            .store
            .invoice_for_period(m.id, "2025-01".parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(invoice.amount_paid, Money::from_major(300));
        assert_eq!(invoice.status, crate::types::InvoiceStatus::Partial);
        assert_eq!(fixture.store.credit_balance(m.id).unwrap(), Money::ZERO);

        let payments = fixture.store.payments(invoice.id).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].method, PaymentMethod::Advance);
    }

    #[test]
    fn test_informational_policy_leaves_credit_alone() {
        let fixture = Fixture::new(BillingConfig::default());
        let m = member("Ahmed", BillingFrequency::Monthly, (2024, 6, 1));

        fixture
            .store
            .commit(StoreTxn {
                set_credit: Some((m.id, Money::from_major(300))),
                ..StoreTxn::default()
            })
            .unwrap();

        fixture.run(std::slice::from_ref(&m), "2025-01");
        let invoice = fixture
            .store
            .invoice_for_period(m.id, "2025-01".parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(invoice.amount_paid, Money::ZERO);
        assert_eq!(
            fixture.store.credit_balance(m.id).unwrap(),
            Money::from_major(300)
        );
    }

    #[test]
    fn test_directory_feeds_generator() {
        let fixture = Fixture::new(BillingConfig::default());
        let directory = MemoryDirectory::new();
        directory.insert(member("Ahmed", BillingFrequency::Monthly, (2024, 6, 1)));
        directory.insert(member("Bilal", BillingFrequency::Yearly, (2024, 1, 1)));

        let members = directory.active_members().unwrap();
        // yearly member anchored at 2024-01 bills again in 2025-01
        let report = fixture.run(&members, "2025-01");
        assert_eq!(report.generated, 2);
    }
}
