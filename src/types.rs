use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;

/// unique identifier for a member
pub type MemberId = Uuid;

/// unique identifier for an invoice
pub type InvoiceId = Uuid;

/// unique identifier for a payment
pub type PaymentId = Uuid;

/// billing cadence for a member's dues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    Monthly,
    Quarterly,
    SemiAnnual,
    Yearly,
}

impl BillingFrequency {
    /// number of calendar months in one billing cycle
    pub fn months(&self) -> u32 {
        match self {
            BillingFrequency::Monthly => 1,
            BillingFrequency::Quarterly => 3,
            BillingFrequency::SemiAnnual => 6,
            BillingFrequency::Yearly => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingFrequency::Monthly => "monthly",
            BillingFrequency::Quarterly => "quarterly",
            BillingFrequency::SemiAnnual => "semi_annual",
            BillingFrequency::Yearly => "yearly",
        }
    }
}

/// invoice settlement status
///
/// Always derived from the amounts; never set independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// nothing paid yet
    Unpaid,
    /// some but not all of the amount due is paid
    Partial,
    /// amount paid equals amount due; terminal
    Paid,
}

impl InvoiceStatus {
    /// derive status from paid/due amounts
    pub fn from_amounts(amount_paid: Money, amount_due: Money) -> Self {
        if amount_paid >= amount_due {
            InvoiceStatus::Paid
        } else if amount_paid.is_zero() {
            InvoiceStatus::Unpaid
        } else {
            InvoiceStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, InvoiceStatus::Paid)
    }
}

/// how a payment was tendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Cheque,
    Online,
    /// stored advance credit drained into a newly generated invoice
    Advance,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Online => "online",
            PaymentMethod::Advance => "advance",
        }
    }
}

/// shared metadata carried by every payment of one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMeta {
    pub method: PaymentMethod,
    pub bank_account_id: Option<Uuid>,
}

impl PaymentMeta {
    pub fn cash() -> Self {
        Self {
            method: PaymentMethod::Cash,
            bank_account_id: None,
        }
    }

    pub fn bank_transfer(bank_account_id: Uuid) -> Self {
        Self {
            method: PaymentMethod::BankTransfer,
            bank_account_id: Some(bank_account_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derivation() {
        let due = Money::from_major(1000);
        assert_eq!(
            InvoiceStatus::from_amounts(Money::ZERO, due),
            InvoiceStatus::Unpaid
        );
        assert_eq!(
            InvoiceStatus::from_amounts(Money::from_major(400), due),
            InvoiceStatus::Partial
        );
        assert_eq!(
            InvoiceStatus::from_amounts(due, due),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn test_frequency_months() {
        assert_eq!(BillingFrequency::Monthly.months(), 1);
        assert_eq!(BillingFrequency::Quarterly.months(), 3);
        assert_eq!(BillingFrequency::SemiAnnual.months(), 6);
        assert_eq!(BillingFrequency::Yearly.months(), 12);
    }
}
