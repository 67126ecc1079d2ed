use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{BillingError, Result};
use crate::types::MemberId;

/// per-member serialization for balance-mutating operations
///
/// Two concurrent allocations for the same member would otherwise both read
/// the same open balances and double-apply. Acquisition is bounded: exceeding
/// the timeout surfaces as a retryable `Contention` error, never a hang.
#[derive(Debug, Default)]
pub struct MemberLocks {
    locks: Mutex<HashMap<MemberId, Arc<Mutex<()>>>>,
}

impl MemberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, member_id: MemberId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(member_id)
            .or_default()
            .clone()
    }

    /// run `f` while holding the member's lock
    pub fn with_member<T>(
        &self,
        member_id: MemberId,
        timeout: Duration,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let handle = self.handle(member_id);
        let guard = handle
            .try_lock_for(timeout)
            .ok_or(BillingError::Contention { member_id })?;
        let result = f();
        drop(guard);
        result
    }
}
