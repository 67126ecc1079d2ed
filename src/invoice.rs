use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::period::Period;
use crate::types::{InvoiceId, InvoiceStatus, MemberId, PaymentId, PaymentMethod};

/// one member's dues for one billing period
///
/// Exactly one invoice exists per (member_id, period); the store enforces the
/// pair as a uniqueness key. `amount_due` is fixed at creation, `amount_paid`
/// only ever increases, and `status` is always derived from the two amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub member_id: MemberId,
    pub period: Period,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(
        member_id: MemberId,
        period: Period,
        amount_due: Money,
        due_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            period,
            amount_due,
            amount_paid: Money::ZERO,
            status: InvoiceStatus::Unpaid,
            due_date,
            created_at,
        }
    }

    /// balance still owed on this invoice
    pub fn outstanding(&self) -> Money {
        self.amount_due - self.amount_paid
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }

    /// apply a partial or full payment, raising `amount_paid`
    ///
    /// The amount must be positive and must not exceed the outstanding
    /// balance; status is recomputed from the amounts.
    pub fn apply_payment(&mut self, amount: Money) -> Result<()> {
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount { amount });
        }
        if amount > self.outstanding() {
            return Err(BillingError::InvalidAmount { amount });
        }
        self.amount_paid += amount;
        self.status = InvoiceStatus::from_amounts(self.amount_paid, self.amount_due);
        Ok(())
    }
}

/// one applied payment against one invoice
///
/// An invoice may carry many payments; their amounts always sum to the
/// invoice's `amount_paid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub bank_account_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub receipt_no: String,
}

impl Payment {
    pub fn new(
        invoice_id: InvoiceId,
        amount: Money,
        method: PaymentMethod,
        bank_account_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
        receipt_no: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            invoice_id,
            amount,
            method,
            bank_account_id,
            timestamp,
            receipt_no,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(due: i64) -> Invoice {
        Invoice::new(
            Uuid::new_v4(),
            "2025-01".parse().unwrap(),
            Money::from_major(due),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_invoice_is_unpaid() {
        let inv = invoice(1000);
        assert_eq!(inv.status, InvoiceStatus::Unpaid);
        assert_eq!(inv.amount_paid, Money::ZERO);
        assert_eq!(inv.outstanding(), Money::from_major(1000));
    }

    #[test]
    fn test_partial_then_full_payment() {
        let mut inv = invoice(1000);

        inv.apply_payment(Money::from_major(400)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Partial);
        assert_eq!(inv.outstanding(), Money::from_major(600));

        inv.apply_payment(Money::from_major(600)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert!(inv.is_settled());
        assert_eq!(inv.outstanding(), Money::ZERO);
    }

    #[test]
    fn test_direct_full_payment() {
        let mut inv = invoice(1000);
        inv.apply_payment(Money::from_major(1000)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_overpayment_rejected() {
        let mut inv = invoice(1000);
        inv.apply_payment(Money::from_major(800)).unwrap();

        let err = inv.apply_payment(Money::from_major(300)).unwrap_err();
        assert!(matches!(err, BillingError::InvalidAmount { .. }));
        // state unchanged on rejection
        assert_eq!(inv.amount_paid, Money::from_major(800));
        assert_eq!(inv.status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_non_positive_payment_rejected() {
        let mut inv = invoice(1000);
        assert!(inv.apply_payment(Money::ZERO).is_err());
        assert!(inv
            .apply_payment(Money::ZERO - Money::from_major(5))
            .is_err());
    }
}
