//! User Directory (spec §4.1).
//!
//! `user_id -> channel`, at most one live channel per user. This module only
//! owns the map itself; the cross-cutting register/unbind choreography
//! (closing the stale channel, touching presence, draining pending signals)
//! lives in `csm.rs` since it is a multi-table operation (spec §5: "a global
//! lock for any cross-call / cross-user step").

use std::collections::HashMap;

use crate::ids::UserId;
use crate::transport::Channel;

#[derive(Debug, Default)]
pub struct UserDirectory {
    channels: HashMap<UserId, Channel>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, user_id: &UserId) -> Option<Channel> {
        self.channels.get(user_id).cloned()
    }

    /// Install `channel` as the live channel for `user_id`, returning the
    /// channel it replaced, if any.
    pub fn install(&mut self, user_id: UserId, channel: Channel) -> Option<Channel> {
        self.channels.insert(user_id, channel)
    }

    /// Remove the mapping for `user_id` only if its currently-bound channel
    /// is `channel` (spec §4.1: re-registration may have already superseded
    /// it, in which case this is a no-op).
    pub fn unbind(&mut self, user_id: &UserId, channel: &Channel) -> bool {
        if self.channels.get(user_id) == Some(channel) {
            self.channels.remove(user_id);
            true
        } else {
            false
        }
    }

    pub fn connected_user_ids(&self) -> Vec<UserId> {
        self.channels.keys().cloned().collect()
    }
}
