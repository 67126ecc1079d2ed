use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::period::Period;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error("invalid payment amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("no outstanding invoices for member {member_id}")]
    NoOutstandingInvoices {
        member_id: Uuid,
    },

    #[error("invoice already exists for member {member_id} in {period}")]
    DuplicateInvoice {
        member_id: Uuid,
        period: Period,
    },

    #[error("contention on member {member_id}, retry later")]
    Contention {
        member_id: Uuid,
    },

    #[error("persistence failure: {message}")]
    Persistence {
        message: String,
    },

    #[error("member not found: {id}")]
    MemberNotFound {
        id: Uuid,
    },

    #[error("invoice not found: {id}")]
    InvoiceNotFound {
        id: Uuid,
    },

    #[error("invalid period: {value}")]
    InvalidPeriod {
        value: String,
    },

    #[error("selection is stale for member {member_id} in {period}: {reason}")]
    SelectionStale {
        member_id: Uuid,
        period: Period,
        reason: String,
    },
}

impl BillingError {
    /// whether the caller may retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Contention { .. })
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
