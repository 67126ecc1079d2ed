use serde::{Deserialize, Serialize};
use std::time::Duration;

/// how an invoice's due date is derived from its billing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueDatePolicy {
    /// due on the first day of the cycle
    PeriodStart,
    /// due on the last day of the cycle
    PeriodEnd,
    /// due a fixed number of days after the cycle starts
    DaysAfterStart(u32),
}

/// what happens to payment left over once all arrears are settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
    /// report the remainder to the caller; persist nothing
    Informational,
    /// store the remainder as member credit, drained into the member's next
    /// generated invoice at creation time
    CreditNextInvoice,
}

/// engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub due_date_policy: DueDatePolicy,
    pub advance_policy: AdvancePolicy,
    /// how long to wait for a member's lock before surfacing Contention
    pub lock_timeout: Duration,
}

impl BillingConfig {
    pub fn with_due_date_policy(mut self, policy: DueDatePolicy) -> Self {
        self.due_date_policy = policy;
        self
    }

    pub fn with_advance_policy(mut self, policy: AdvancePolicy) -> Self {
        self.advance_policy = policy;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            due_date_policy: DueDatePolicy::PeriodStart,
            advance_policy: AdvancePolicy::Informational,
            lock_timeout: Duration::from_secs(5),
        }
    }
}
