use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::allocation::{AllocationRequest, PaymentAllocator};
use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::BillingError;
use crate::events::{Event, EventStore};
use crate::invoice::Invoice;
use crate::lock::MemberLocks;
use crate::member::MemberDirectory;
use crate::period::Period;
use crate::receipt::{ReceiptData, ReceiptLine, ReceiptSequence};
use crate::store::InvoiceStore;
use crate::types::{MemberId, PaymentMeta};

/// one selected cell of the payment matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub member_id: MemberId,
    pub period: Period,
}

/// one matrix cell that could not be collected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub member_id: MemberId,
    pub period: Period,
    pub reason: String,
}

/// outcome of one bulk collection submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkReport {
    pub receipts: Vec<ReceiptData>,
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn collected_total(&self) -> Money {
        self.receipts.iter().map(|r| r.total).sum()
    }
}

/// fans one matrix submission out into independent per-member allocations
///
/// Each member-batch settles exactly the selected invoices for exactly their
/// remaining balances, under one shared receipt number. One member's failure
/// never rolls back another member's success.
pub struct BulkCollector<'a> {
    store: &'a dyn InvoiceStore,
    directory: &'a dyn MemberDirectory,
    receipts: &'a dyn ReceiptSequence,
    allocator: PaymentAllocator<'a>,
}

impl<'a> BulkCollector<'a> {
    pub fn new(
        store: &'a dyn InvoiceStore,
        directory: &'a dyn MemberDirectory,
        receipts: &'a dyn ReceiptSequence,
        locks: &'a MemberLocks,
        config: &'a BillingConfig,
    ) -> Self {
        Self {
            store,
            directory,
            receipts,
            allocator: PaymentAllocator::new(store, receipts, locks, config),
        }
    }

    pub fn bulk_allocate(
        &self,
        selections: &[Selection],
        meta: PaymentMeta,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> BulkReport {
        let mut report = BulkReport {
            receipts: Vec::new(),
            failures: Vec::new(),
        };

        // resolve each cell to an open invoice; stale cells fail on their own
        let mut per_member: BTreeMap<MemberId, Vec<Invoice>> = BTreeMap::new();
        for selection in selections {
            // an exact duplicate cell expresses the same intent once
            if per_member
                .get(&selection.member_id)
                .is_some_and(|list| list.iter().any(|i| i.period == selection.period))
            {
                continue;
            }
            match self.resolve(selection) {
                Ok(invoice) => per_member
                    .entry(selection.member_id)
                    .or_default()
                    .push(invoice),
                Err(e) => {
                    warn!(member = %selection.member_id, period = %selection.period, error = %e, "stale selection");
                    report.failures.push(BulkFailure {
                        member_id: selection.member_id,
                        period: selection.period,
                        reason: e.to_string(),
                    });
                }
            }
        }

        for (member_id, invoices) in per_member {
            let member = match self.directory.member(member_id) {
                Ok(Some(member)) => member,
                Ok(None) => {
                    let e = BillingError::MemberNotFound { id: member_id };
                    self.fail_member(&mut report, member_id, &invoices, &e);
                    continue;
                }
                Err(e) => {
                    self.fail_member(&mut report, member_id, &invoices, &e);
                    continue;
                }
            };

            let total: Money = invoices.iter().map(|i| i.outstanding()).sum();
            let selected: Vec<_> = invoices.iter().map(|i| i.id).collect();
            let receipt_no = self.receipts.next_receipt_no();
            let request = AllocationRequest {
                member_id,
                total_amount: total,
                meta,
            };

            match self
                .allocator
                .allocate_selected(&request, &selected, &receipt_no, now, events)
            {
                Ok(outcome) => {
                    let receipt = ReceiptData {
                        receipt_no: receipt_no.clone(),
                        member_id,
                        member_name: member.name.clone(),
                        method: meta.method,
                        bank_account_id: meta.bank_account_id,
                        total: outcome.total_applied(),
                        lines: outcome
                            .allocations
                            .iter()
                            .map(|a| ReceiptLine {
                                invoice_id: a.invoice_id,
                                period: a.period,
                                amount: a.amount_applied,
                            })
                            .collect(),
                        advance_remainder: outcome.advance_remainder,
                        timestamp: now,
                    };
                    events.emit(Event::ReceiptIssued {
                        receipt_no,
                        member_id,
                        total: receipt.total,
                        periods: receipt.lines.iter().map(|l| l.period).collect(),
                        timestamp: now,
                    });
                    report.receipts.push(receipt);
                }
                Err(e) => self.fail_member(&mut report, member_id, &invoices, &e),
            }
        }

        info!(
            receipts = report.receipts.len(),
            failures = report.failures.len(),
            total = %report.collected_total(),
            "bulk collection completed"
        );
        report
    }

    fn resolve(&self, selection: &Selection) -> crate::errors::Result<Invoice> {
        let stale = |reason: &str| BillingError::SelectionStale {
            member_id: selection.member_id,
            period: selection.period,
            reason: reason.to_string(),
        };
        let invoice = self
            .store
            .invoice_for_period(selection.member_id, selection.period)?
            .ok_or_else(|| stale("no invoice for period"))?;
        if invoice.is_settled() {
            return Err(stale("invoice already settled"));
        }
        Ok(invoice)
    }

    /// a member-level error fails each of that member's resolved cells
    fn fail_member(
        &self,
        report: &mut BulkReport,
        member_id: MemberId,
        invoices: &[Invoice],
        error: &BillingError,
    ) {
        warn!(member = %member_id, error = %error, "member batch failed");
        for invoice in invoices {
            report.failures.push(BulkFailure {
                member_id,
                period: invoice.period,
                reason: error.to_string(),
            });
        }
    }
}
