//! Clock & Timer Service (spec §2 item 1, §9 "Timers" design note).
//!
//! The CSM's only source of time is `tokio::time::Instant::now()`, so that
//! tests can drive it deterministically with `tokio::time::{pause, advance}`
//! instead of sleeping in real time. Per-call single-shot timers are modeled
//! as a `CallId -> AbortHandle` map; inserting a new handle for a key that is
//! already present cancels the prior one atomically with the insert, per §9:
//! "A replacement ... must cancel the prior handle atomically with insertion."

use std::collections::HashMap;

use tokio::task::AbortHandle;

use crate::ids::CallId;

pub use tokio::time::Instant;

pub fn now() -> Instant {
    Instant::now()
}

/// `call_id -> cancel handle` map for the per-call no-answer timer.
#[derive(Default)]
pub struct TimerMap {
    handles: HashMap<CallId, AbortHandle>,
}

impl TimerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `handle` for `call_id`, aborting and replacing any prior timer for
    /// the same id. Returns the superseded handle, if any.
    pub fn arm(&mut self, call_id: CallId, handle: AbortHandle) -> Option<AbortHandle> {
        let prior = self.handles.insert(call_id, handle);
        if let Some(prior) = &prior {
            prior.abort();
        }
        prior
    }

    /// Cancel and remove the timer for `call_id`, if any. Called by any
    /// handler that transitions a call out of `initiated`.
    pub fn cancel(&mut self, call_id: &CallId) {
        if let Some(handle) = self.handles.remove(call_id) {
            handle.abort();
        }
    }

    /// Remove the bookkeeping entry for `call_id` without aborting — used by
    /// the timer callback itself once it has fired, since aborting a handle
    /// that already ran is a harmless no-op but keeping it around would leak.
    pub fn forget(&mut self, call_id: &CallId) {
        self.handles.remove(call_id);
    }
}
