//! Call Registry (spec §2 item 5, §4.3).
//!
//! Owns the `call_id -> CallRecord` map and the no-answer timer handles.
//! State-machine transitions (who gets created, mutated, and cleaned up, and
//! in what order) are orchestrated by `Csm` in `csm.rs`, since every
//! transition also touches the Presence Table and/or Pending Signal Queue —
//! this module only owns the registry's own bookkeeping.

use std::collections::HashMap;

use crate::call::CallRecord;
use crate::clock::TimerMap;
use crate::ids::CallId;

#[derive(Default)]
pub struct CallRegistry {
    calls: HashMap<CallId, CallRecord>,
    pub timers: TimerMap,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, call_id: &CallId) -> Option<&CallRecord> {
        self.calls.get(call_id)
    }

    pub fn get_mut(&mut self, call_id: &CallId) -> Option<&mut CallRecord> {
        self.calls.get_mut(call_id)
    }

    /// Insert `record`, replacing (and returning) any stale record already
    /// registered under the same id (spec §4.3 "Collision on initiate").
    pub fn insert(&mut self, record: CallRecord) -> Option<CallRecord> {
        let call_id = record.call_id.clone();
        self.timers.cancel(&call_id);
        self.calls.insert(call_id, record)
    }

    pub fn remove(&mut self, call_id: &CallId) -> Option<CallRecord> {
        self.timers.cancel(call_id);
        self.calls.remove(call_id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&CallId, &mut CallRecord)> {
        self.calls.iter_mut()
    }

    pub fn snapshot(&self) -> &HashMap<CallId, CallRecord> {
        &self.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UserId;

    fn record(call_id: &str) -> CallRecord {
        CallRecord::new(
            CallId(call_id.into()),
            UserId("A".into()),
            vec![UserId("B".into())],
            "audio".into(),
            None,
        )
    }

    #[test]
    fn insert_replaces_a_stale_record_with_the_same_id() {
        let mut registry = CallRegistry::new();
        registry.insert(record("c1"));
        let replaced = registry.insert(record("c1"));
        assert!(replaced.is_some());
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn remove_drops_the_record() {
        let mut registry = CallRegistry::new();
        registry.insert(record("c1"));
        assert!(registry.remove(&CallId("c1".into())).is_some());
        assert!(registry.get(&CallId("c1".into())).is_none());
    }
}
