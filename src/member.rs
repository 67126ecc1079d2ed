use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::decimal::Money;
use crate::errors::Result;
use crate::types::{BillingFrequency, MemberId};

/// member read-model
///
/// The engine never mutates members; registration and rate changes live with
/// the caller. `amount_per_cycle` is sampled at invoice generation time, so a
/// rate change only affects invoices generated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub frequency: BillingFrequency,
    pub amount_per_cycle: Money,
    pub start_date: NaiveDate,
    pub active: bool,
}

/// read access to member records, provided by the caller
pub trait MemberDirectory: Send + Sync {
    fn member(&self, id: MemberId) -> Result<Option<Member>>;

    /// active members, ordered by name then id for deterministic batch runs
    fn active_members(&self) -> Result<Vec<Member>>;
}

/// in-memory member directory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    members: RwLock<HashMap<MemberId, Member>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, member: Member) {
        self.members.write().insert(member.id, member);
    }

    pub fn deactivate(&self, id: MemberId) {
        if let Some(member) = self.members.write().get_mut(&id) {
            member.active = false;
        }
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

impl MemberDirectory for MemoryDirectory {
    fn member(&self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.members.read().get(&id).cloned())
    }

    fn active_members(&self) -> Result<Vec<Member>> {
        let mut members: Vec<Member> = self
            .members
            .read()
            .values()
            .filter(|m| m.active)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(members)
    }
}
