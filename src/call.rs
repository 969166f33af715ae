//! Call record and state tags (spec §3 "Call record", §9 "Tagged states").

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::clock::Instant;
use crate::ids::{CallId, UserId};
use crate::transport::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    Active,
    // `Terminated` is intentionally absent: terminal calls are removed from
    // the registry rather than stored (spec §3).
}

#[derive(Debug, Clone)]
pub struct IceCandidateEntry {
    pub from: UserId,
    pub candidate: String,
    pub ts: Instant,
}

pub struct CallRecord {
    pub call_id: CallId,
    pub caller_id: UserId,
    pub receiver_ids: Vec<UserId>,
    pub call_type: String,
    pub extra_meta: Option<Value>,

    /// Ordered set of user ids currently bound to this call. Kept as a `Vec`
    /// with de-duplicated inserts since baseline calls are tiny (1:1, plus a
    /// handful of `call_participant_add` hooks — spec §2 item 6, §9).
    pub participants: Vec<UserId>,
    pub participant_channels: HashMap<UserId, Channel>,

    pub status: CallStatus,
    pub offer_attempts: u32,
    pub last_offer_time: Option<Instant>,
    pub ice_buffer: HashMap<UserId, Vec<IceCandidateEntry>>,
}

impl CallRecord {
    pub fn new(
        call_id: CallId,
        caller_id: UserId,
        receiver_ids: Vec<UserId>,
        call_type: String,
        extra_meta: Option<Value>,
    ) -> Self {
        let participants = vec![caller_id.clone()];
        Self {
            call_id,
            caller_id,
            receiver_ids,
            call_type,
            extra_meta,
            participants,
            participant_channels: HashMap::new(),
            status: CallStatus::Initiated,
            offer_attempts: 0,
            last_offer_time: None,
            ice_buffer: HashMap::new(),
        }
    }

    pub fn add_participant(&mut self, user_id: UserId) {
        if !self.participants.contains(&user_id) {
            self.participants.push(user_id);
        }
    }

    pub fn remove_participant(&mut self, user_id: &UserId) {
        self.participants.retain(|id| id != user_id);
        self.participant_channels.remove(user_id);
    }

    pub fn bind_channel(&mut self, user_id: UserId, channel: Channel) {
        self.add_participant(user_id.clone());
        self.participant_channels.insert(user_id, channel);
    }

    /// Fast-path lookup validated against the live channel's own binding
    /// (spec §4.1: "the cached entry is missing or stale").
    pub fn cached_channel(&self, user_id: &UserId) -> Option<Channel> {
        let channel = self.participant_channels.get(user_id)?;
        if channel.bound_user_id().as_ref() == Some(user_id) {
            Some(channel.clone())
        } else {
            None
        }
    }

    pub fn every_participant_bound(&self) -> bool {
        self.participants
            .iter()
            .all(|id| self.cached_channel(id).is_some())
    }

    pub fn bound_channels(&self) -> Vec<Channel> {
        self.participants
            .iter()
            .filter_map(|id| self.cached_channel(id))
            .collect()
    }

    /// The caller plus every declared receiver, independent of whether they
    /// have joined `participants` yet. Used to reset presence on `call_reject`
    /// and timeout, since a ringing receiver is not yet a participant (spec
    /// §4.3).
    pub fn declared_users(&self) -> Vec<UserId> {
        let mut ids = vec![self.caller_id.clone()];
        for receiver_id in &self.receiver_ids {
            if !ids.contains(receiver_id) {
                ids.push(receiver_id.clone());
            }
        }
        ids
    }
}
