use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::Result;
use crate::period::Period;
use crate::store::InvoiceStore;
use crate::types::{InvoiceId, InvoiceStatus, MemberId};

/// one unpaid or partially paid period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBalance {
    pub invoice_id: InvoiceId,
    pub period: Period,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub outstanding: Money,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
}

/// a member's arrears position
///
/// `unpaid_periods` is ordered oldest first — the same order a payment will
/// settle them in, so what the caller shows is what a payment will do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrearsSummary {
    pub member_id: MemberId,
    pub total_outstanding: Money,
    pub unpaid_periods: Vec<PeriodBalance>,
}

impl ArrearsSummary {
    /// number of periods carrying any balance
    pub fn periods_behind(&self) -> usize {
        self.unpaid_periods.len()
    }

    pub fn is_clear(&self) -> bool {
        self.unpaid_periods.is_empty()
    }
}

/// read-only aggregation over the invoice store
pub struct ArrearsAggregator<'a> {
    store: &'a dyn InvoiceStore,
}

impl<'a> ArrearsAggregator<'a> {
    pub fn new(store: &'a dyn InvoiceStore) -> Self {
        Self { store }
    }

    /// the member's outstanding balance and unpaid periods, oldest first
    pub fn arrears_for(&self, member_id: MemberId) -> Result<ArrearsSummary> {
        let open = self.store.open_invoices(member_id)?;
        let unpaid_periods: Vec<PeriodBalance> = open
            .iter()
            .map(|i| PeriodBalance {
                invoice_id: i.id,
                period: i.period,
                amount_due: i.amount_due,
                amount_paid: i.amount_paid,
                outstanding: i.outstanding(),
                due_date: i.due_date,
                status: i.status,
            })
            .collect();
        let total_outstanding = unpaid_periods.iter().map(|p| p.outstanding).sum();
        Ok(ArrearsSummary {
            member_id,
            total_outstanding,
            unpaid_periods,
        })
    }

    /// every member owing anything, largest balance first (ties by id)
    pub fn arrears_for_all(&self) -> Result<Vec<ArrearsSummary>> {
        let mut summaries = Vec::new();
        for member_id in self.store.members_with_arrears()? {
            let summary = self.arrears_for(member_id)?;
            if !summary.is_clear() {
                summaries.push(summary);
            }
        }
        summaries.sort_by(|a, b| {
            b.total_outstanding
                .cmp(&a.total_outstanding)
                .then(a.member_id.cmp(&b.member_id))
        });
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::Invoice;
    use crate::store::{MemoryStore, StoreTxn};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn seed(store: &MemoryStore, member_id: MemberId, period: &str, due: i64, paid: i64) {
        let period: Period = period.parse().unwrap();
        let mut invoice = Invoice::new(
            member_id,
            period,
            Money::from_major(due),
            period.first_day(),
            Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap(),
        );
        if paid > 0 {
            invoice.apply_payment(Money::from_major(paid)).unwrap();
        }
        store
            .commit(StoreTxn {
                insert_invoices: vec![invoice],
                ..StoreTxn::default()
            })
            .unwrap();
    }

    #[test]
    fn test_arrears_ordering_matches_allocation_order() {
        let store = MemoryStore::new();
        let member_id = Uuid::new_v4();
        seed(&store, member_id, "2025-03", 1000, 0);
        seed(&store, member_id, "2025-01", 1000, 400);
        seed(&store, member_id, "2025-02", 1000, 0);

        let aggregator = ArrearsAggregator::new(&store);
        let summary = aggregator.arrears_for(member_id).unwrap();

        let periods: Vec<String> = summary
            .unpaid_periods
            .iter()
            .map(|p| p.period.to_string())
            .collect();
        assert_eq!(periods, vec!["2025-01", "2025-02", "2025-03"]);
        assert_eq!(summary.total_outstanding, Money::from_major(2600));
        assert_eq!(summary.periods_behind(), 3);
        assert_eq!(summary.unpaid_periods[0].outstanding, Money::from_major(600));
        assert_eq!(summary.unpaid_periods[0].status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_settled_members_excluded_from_report() {
        let store = MemoryStore::new();
        let owing = Uuid::new_v4();
        let clear = Uuid::new_v4();
        seed(&store, owing, "2025-01", 1000, 0);
        seed(&store, clear, "2025-01", 1000, 1000);

        let aggregator = ArrearsAggregator::new(&store);
        let all = aggregator.arrears_for_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].member_id, owing);
    }

    #[test]
    fn test_report_ordered_largest_balance_first() {
        let store = MemoryStore::new();
        let small = Uuid::new_v4();
        let large = Uuid::new_v4();
        seed(&store, small, "2025-01", 500, 0);
        seed(&store, large, "2025-01", 1000, 0);
        seed(&store, large, "2025-02", 1000, 0);

        let aggregator = ArrearsAggregator::new(&store);
        let all = aggregator.arrears_for_all().unwrap();
        assert_eq!(all[0].member_id, large);
        assert_eq!(all[0].total_outstanding, Money::from_major(2000));
        assert_eq!(all[1].member_id, small);
    }

    #[test]
    fn test_clear_member_summary() {
        let store = MemoryStore::new();
        let aggregator = ArrearsAggregator::new(&store);
        let summary = aggregator.arrears_for(Uuid::new_v4()).unwrap();
        assert!(summary.is_clear());
        assert_eq!(summary.total_outstanding, Money::ZERO);
    }
}
