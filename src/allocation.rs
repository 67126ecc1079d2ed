use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{AdvancePolicy, BillingConfig};
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::events::{Event, EventStore};
use crate::invoice::Payment;
use crate::lock::MemberLocks;
use crate::period::Period;
use crate::receipt::ReceiptSequence;
use crate::store::{InvoiceStore, StoreTxn};
use crate::types::{InvoiceId, InvoiceStatus, MemberId, PaymentMeta};

/// one payment to distribute across a member's arrears
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub member_id: MemberId,
    pub total_amount: Money,
    pub meta: PaymentMeta,
}

/// how much of the payment landed on one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub invoice_id: InvoiceId,
    pub period: Period,
    pub amount_applied: Money,
    pub resulting_status: InvoiceStatus,
}

/// result of one allocation operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub member_id: MemberId,
    pub allocations: Vec<Allocation>,
    pub payments: Vec<Payment>,
    /// payment left over once every targeted invoice is settled
    pub advance_remainder: Money,
}

impl AllocationOutcome {
    pub fn total_applied(&self) -> Money {
        self.allocations
            .iter()
            .map(|a| a.amount_applied)
            .sum()
    }
}

/// distributes a payment across a member's open invoices, oldest first
///
/// The waterfall fills each invoice's remaining balance in period order until
/// the payment is exhausted; everything it touches commits in one store
/// transaction under the member's lock.
pub struct PaymentAllocator<'a> {
    store: &'a dyn InvoiceStore,
    receipts: &'a dyn ReceiptSequence,
    locks: &'a MemberLocks,
    config: &'a BillingConfig,
}

impl<'a> PaymentAllocator<'a> {
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
        }
    }

    /// allocate a payment across all of the member's arrears
    ///
    /// Each applied slice becomes one payment record with its own receipt
    /// number. Fails atomically: on any error no balance moves and no record
    /// is written.
    pub fn allocate(
        &self,
        request: &AllocationRequest,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<AllocationOutcome> {
        self.allocate_inner(request, None, None, now, events)
    }

    /// allocate restricted to an explicit invoice set, sharing one receipt
    /// number across the batch — the bulk collector's entry point
    pub(crate) fn allocate_selected(
        &self,
        request: &AllocationRequest,
        selected: &[InvoiceId],
        shared_receipt_no: &str,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<AllocationOutcome> {
        self.allocate_inner(request, Some(selected), Some(shared_receipt_no), now, events)
    }

    fn allocate_inner(
        &self,
        request: &AllocationRequest,
        restrict_to: Option<&[InvoiceId]>,
        shared_receipt_no: Option<&str>,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<AllocationOutcome> {
        if !request.total_amount.is_positive() {
            return Err(BillingError::InvalidAmount {
                amount: request.total_amount,
            });
        }

        let member_id = request.member_id;
        self.locks
            .with_member(member_id, self.config.lock_timeout, || {
                let mut open = self.store.open_invoices(member_id)?;
                if let Some(ids) = restrict_to {
                    open.retain(|i| ids.contains(&i.id));
                }
                if open.is_empty() {
                    return Err(BillingError::NoOutstandingInvoices { member_id });
                }

                let mut remaining = request.total_amount;
                let mut allocations = Vec::new();
                let mut payments = Vec::new();
                let mut updated = Vec::new();
                let mut pending_events = Vec::new();

                for mut invoice in open {
                    if remaining.is_zero() {
                        break;
                    }
                    let due = invoice.outstanding();
                    let applied = remaining.min(due);
                    let old_status = invoice.status;
                    invoice.apply_payment(applied)?;
                    remaining -= applied;

                    let receipt_no = match shared_receipt_no {
                        Some(no) => no.to_string(),
                        None => self.receipts.next_receipt_no(),
                    };
                    let payment = Payment::new(
                        invoice.id,
                        applied,
                        request.meta.method,
                        request.meta.bank_account_id,
                        now,
                        receipt_no.clone(),
                    );

                    pending_events.push(Event::PaymentReceived {
                        payment_id: payment.id,
                        invoice_id: invoice.id,
                        member_id,
                        amount: applied,
                        method: request.meta.method,
                        receipt_no,
                        timestamp: now,
                    });
                    pending_events.push(Event::InvoiceStatusChanged {
                        invoice_id: invoice.id,
                        member_id,
                        old_status,
                        new_status: invoice.status,
                        timestamp: now,
                    });
                    if invoice.is_settled() {
                        pending_events.push(Event::InvoiceSettled {
                            invoice_id: invoice.id,
                            member_id,
                            period: invoice.period,
                            timestamp: now,
                        });
                    }

                    allocations.push(Allocation {
                        invoice_id: invoice.id,
                        period: invoice.period,
                        amount_applied: applied,
                        resulting_status: invoice.status,
                    });
                    payments.push(payment);
                    updated.push(invoice);
                }

                let advance = remaining;
                let mut txn = StoreTxn {
                    update_invoices: updated,
                    insert_payments: payments.clone(),
                    ..StoreTxn::default()
                };
                let stored_as_credit = advance.is_positive()
                    && self.config.advance_policy == AdvancePolicy::CreditNextInvoice;
                if stored_as_credit {
                    let credit = self.store.credit_balance(member_id)?;
                    txn.set_credit = Some((member_id, credit + advance));
                }

                self.store.commit(txn)?;

                for event in pending_events {
                    events.emit(event);
                }
                if advance.is_positive() {
                    debug!(member = %member_id, amount = %advance, stored_as_credit, "advance remainder");
                    events.emit(Event::AdvanceRetained {
                        member_id,
                        amount: advance,
                        stored_as_credit,
                        timestamp: now,
                    });
                }
                info!(
                    member = %member_id,
                    total = %request.total_amount,
                    invoices = allocations.len(),
                    advance = %advance,
                    "payment allocated"
                );

                Ok(AllocationOutcome {
                    member_id,
                    allocations,
                    payments,
                    advance_remainder: advance,
                })
            })
    }
}
