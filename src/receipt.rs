use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::decimal::Money;
use crate::period::Period;
use crate::types::{InvoiceId, MemberId, PaymentMethod};

/// receipt number source, provided by the caller
///
/// Numbers should be monotonic; binding this to a durable sequence is the
/// caller's concern. The process-local default below is unique per process.
pub trait ReceiptSequence: Send + Sync {
    fn next_receipt_no(&self) -> String;
}

/// prefix + zero-padded monotonic counter, e.g. "SND-000042"
#[derive(Debug)]
pub struct SequentialReceipts {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialReceipts {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    /// resume an existing sequence, e.g. after reading the high-water mark
    /// back from storage
    pub fn starting_at(prefix: impl Into<String>, next: u64) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(next),
        }
    }
}

impl ReceiptSequence for SequentialReceipts {
    fn next_receipt_no(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{:06}", self.prefix, n)
    }
}

/// one settled (or partially settled) period on a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub invoice_id: InvoiceId,
    pub period: Period,
    pub amount: Money,
}

/// plain-data summary of one collection transaction
///
/// One receipt covers everything a member paid in one submission; printing,
/// mailing, and export are the caller's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub receipt_no: String,
    pub member_id: MemberId,
    pub member_name: String,
    pub method: PaymentMethod,
    pub bank_account_id: Option<Uuid>,
    pub total: Money,
    pub lines: Vec<ReceiptLine>,
    pub advance_remainder: Money,
    pub timestamp: DateTime<Utc>,
}

impl ReceiptData {
    pub fn json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("JSON error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let seq = SequentialReceipts::new("SND");
        assert_eq!(seq.next_receipt_no(), "SND-000001");
        assert_eq!(seq.next_receipt_no(), "SND-000002");
        assert_eq!(seq.next_receipt_no(), "SND-000003");
    }

    #[test]
    fn test_sequence_resumes_from_high_water_mark() {
        let seq = SequentialReceipts::starting_at("SND", 990);
        assert_eq!(seq.next_receipt_no(), "SND-000990");
    }

    #[test]
    fn test_receipt_json_roundtrip() {
        let receipt = ReceiptData {
            receipt_no: "SND-000001".to_string(),
            member_id: Uuid::new_v4(),
            member_name: "Ahmed".to_string(),
            method: PaymentMethod::Cash,
            bank_account_id: None,
            total: Money::from_major(2000),
            lines: vec![ReceiptLine {
                invoice_id: Uuid::new_v4(),
                period: "2025-01".parse().unwrap(),
                amount: Money::from_major(2000),
            }],
            advance_remainder: Money::ZERO,
            timestamp: Utc::now(),
        };

        let parsed: ReceiptData = serde_json::from_str(&receipt.json()).unwrap();
        assert_eq!(parsed, receipt);
    }
}
