//! Presence Table (spec §2 item 3, §3 "Presence entry").
//!
//! Tagged states instead of ad-hoc strings, per §9's design note: `status`
//! is a closed enum, never a free-form string write.

use std::collections::HashMap;

use serde::Serialize;

use crate::ids::{CallId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Offline,
    Available,
    Ringing,
    Busy,
    InCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    pub current_call_id: Option<CallId>,
}

impl PresenceEntry {
    pub fn offline() -> Self {
        Self {
            status: PresenceStatus::Offline,
            current_call_id: None,
        }
    }

    pub fn available() -> Self {
        Self {
            status: PresenceStatus::Available,
            current_call_id: None,
        }
    }

    pub fn busy(call_id: CallId) -> Self {
        Self {
            status: PresenceStatus::Busy,
            current_call_id: Some(call_id),
        }
    }

    pub fn ringing(call_id: CallId) -> Self {
        Self {
            status: PresenceStatus::Ringing,
            current_call_id: Some(call_id),
        }
    }

    pub fn in_call(call_id: CallId) -> Self {
        Self {
            status: PresenceStatus::InCall,
            current_call_id: Some(call_id),
        }
    }

    /// Spec §3 invariant: `in-call`/`ringing` require a live call; `available`
    /// /`offline` require no call id.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            PresenceStatus::Ringing | PresenceStatus::InCall | PresenceStatus::Busy => {
                self.current_call_id.is_some()
            }
            PresenceStatus::Available | PresenceStatus::Offline => self.current_call_id.is_none(),
        }
    }

    pub fn is_live_call(&self) -> bool {
        matches!(
            self.status,
            PresenceStatus::Ringing | PresenceStatus::InCall | PresenceStatus::Busy
        )
    }
}

/// `user_id -> presence entry` table. Absence means "never seen", which the
/// CSM treats identically to `offline`.
#[derive(Debug, Default)]
pub struct PresenceTable {
    entries: HashMap<UserId, PresenceEntry>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &UserId) -> PresenceEntry {
        self.entries
            .get(user_id)
            .cloned()
            .unwrap_or_else(PresenceEntry::offline)
    }

    pub fn set(&mut self, user_id: UserId, entry: PresenceEntry) {
        debug_assert!(entry.is_consistent());
        self.entries.insert(user_id, entry);
    }

    pub fn snapshot(&self) -> HashMap<UserId, PresenceEntry> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_is_offline() {
        let table = PresenceTable::new();
        let entry = table.get(&UserId("A".into()));
        assert_eq!(entry.status, PresenceStatus::Offline);
        assert!(entry.current_call_id.is_none());
    }

    #[test]
    fn busy_and_ringing_carry_a_call_id() {
        assert!(PresenceEntry::busy(CallId("c1".into())).is_consistent());
        assert!(PresenceEntry::ringing(CallId("c1".into())).is_consistent());
        assert!(PresenceEntry::in_call(CallId("c1".into())).is_consistent());
    }

    #[test]
    fn available_and_offline_carry_no_call_id() {
        assert!(PresenceEntry::available().is_consistent());
        assert!(PresenceEntry::offline().is_consistent());
    }
}
