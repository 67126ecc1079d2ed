use parking_lot::RwLock;
use std::collections::HashMap;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::invoice::{Invoice, Payment};
use crate::period::Period;
use crate::types::{InvoiceId, MemberId};

/// one atomic unit of work against the store
///
/// Everything in a transaction is applied together or not at all; the engine
/// builds one transaction per member-level operation.
#[derive(Debug, Clone, Default)]
pub struct StoreTxn {
    pub insert_invoices: Vec<Invoice>,
    pub update_invoices: Vec<Invoice>,
    pub insert_payments: Vec<Payment>,
    /// new absolute credit balance for the member, when the advance policy
    /// stores credit
    pub set_credit: Option<(MemberId, Money)>,
}

impl StoreTxn {
    pub fn is_empty(&self) -> bool {
        self.insert_invoices.is_empty()
            && self.update_invoices.is_empty()
            && self.insert_payments.is_empty()
            && self.set_credit.is_none()
    }
}

/// durable invoice and payment persistence, provided by the caller
///
/// Implementations must enforce (member_id, period) uniqueness on insert and
/// apply a `StoreTxn` atomically: a failed commit leaves no partial state
/// visible to any reader.
pub trait InvoiceStore: Send + Sync {
    fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>>;

    fn invoice_for_period(&self, member_id: MemberId, period: Period) -> Result<Option<Invoice>>;

    /// the member's invoices with status != Paid, ordered by period
    /// ascending, ties by created_at ascending — the allocation order
    fn open_invoices(&self, member_id: MemberId) -> Result<Vec<Invoice>>;

    /// members owing anything, ordered by id for deterministic reports
    fn members_with_arrears(&self) -> Result<Vec<MemberId>>;

    fn payments(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>>;

    /// stored advance credit for the member; zero when none
    fn credit_balance(&self, member_id: MemberId) -> Result<Money>;

    fn commit(&self, txn: StoreTxn) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    invoices: HashMap<InvoiceId, Invoice>,
    by_member_period: HashMap<(MemberId, Period), InvoiceId>,
    payments: HashMap<InvoiceId, Vec<Payment>>,
    credits: HashMap<MemberId, Money>,
}

/// in-memory reference store
///
/// A single write lock around each commit gives the all-or-nothing guarantee;
/// validation happens before any mutation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoice_count(&self) -> usize {
        self.state.read().invoices.len()
    }

    fn validate(state: &MemoryState, txn: &StoreTxn) -> Result<()> {
        for invoice in &txn.insert_invoices {
            let key = (invoice.member_id, invoice.period);
            if state.by_member_period.contains_key(&key) {
                return Err(BillingError::DuplicateInvoice {
                    member_id: invoice.member_id,
                    period: invoice.period,
                });
            }
            if state.invoices.contains_key(&invoice.id) {
                return Err(BillingError::Persistence {
                    message: format!("invoice id collision: {}", invoice.id),
                });
            }
        }

        for updated in &txn.update_invoices {
            let existing = state.invoices.get(&updated.id).ok_or(
                BillingError::InvoiceNotFound { id: updated.id },
            )?;
            if updated.amount_paid < existing.amount_paid {
                return Err(BillingError::Persistence {
                    message: format!(
                        "amount_paid may not decrease on invoice {}",
                        updated.id
                    ),
                });
            }
            if updated.amount_paid > updated.amount_due {
                return Err(BillingError::Persistence {
                    message: format!("overpaid invoice {}", updated.id),
                });
            }
        }

        for payment in &txn.insert_payments {
            if !payment.amount.is_positive() {
                return Err(BillingError::Persistence {
                    message: format!("non-positive payment on invoice {}", payment.invoice_id),
                });
            }
            let in_txn = txn
                .insert_invoices
                .iter()
                .chain(txn.update_invoices.iter())
                .any(|i| i.id == payment.invoice_id);
            if !in_txn && !state.invoices.contains_key(&payment.invoice_id) {
                return Err(BillingError::InvoiceNotFound {
                    id: payment.invoice_id,
                });
            }
        }

        Ok(())
    }
}

impl InvoiceStore for MemoryStore {
    fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        Ok(self.state.read().invoices.get(&id).cloned())
    }

    fn invoice_for_period(&self, member_id: MemberId, period: Period) -> Result<Option<Invoice>> {
        let state = self.state.read();
        Ok(state
            .by_member_period
            .get(&(member_id, period))
            .and_then(|id| state.invoices.get(id))
            .cloned())
    }

    fn open_invoices(&self, member_id: MemberId) -> Result<Vec<Invoice>> {
        let state = self.state.read();
        let mut open: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| i.member_id == member_id && !i.is_settled())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.period.cmp(&b.period).then(a.created_at.cmp(&b.created_at)));
        Ok(open)
    }

    fn members_with_arrears(&self) -> Result<Vec<MemberId>> {
        let state = self.state.read();
        let mut members: Vec<MemberId> = state
            .invoices
            .values()
            .filter(|i| !i.is_settled())
            .map(|i| i.member_id)
            .collect();
        members.sort();
        members.dedup();
        Ok(members)
    }

    fn payments(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>> {
        Ok(self
            .state
            .read()
            .payments
            .get(&invoice_id)
            .cloned()
            .unwrap_or_default())
    }

    fn credit_balance(&self, member_id: MemberId) -> Result<Money> {
        Ok(self
            .state
            .read()
            .credits
            .get(&member_id)
            .copied()
            .unwrap_or(Money::ZERO))
    }

    fn commit(&self, txn: StoreTxn) -> Result<()> {
        let mut state = self.state.write();
        Self::validate(&state, &txn)?;

        for invoice in txn.insert_invoices {
            state
                .by_member_period
                .insert((invoice.member_id, invoice.period), invoice.id);
            state.invoices.insert(invoice.id, invoice);
        }
        for invoice in txn.update_invoices {
            state.invoices.insert(invoice.id, invoice);
        }
        for payment in txn.insert_payments {
            state
                .payments
                .entry(payment.invoice_id)
                .or_default()
                .push(payment);
        }
        if let Some((member_id, credit)) = txn.set_credit {
            if credit.is_zero() {
                state.credits.remove(&member_id);
            } else {
                state.credits.insert(member_id, credit);
            }
        }
        Ok(())
    }
}
