//! Call Session Manager — the orchestrator tying together the five state
//! tables under one coarse lock (spec §5, §9 "Global mutable tables").
//!
//! `Csm` is the only public entry point for transport code: register a
//! channel, dispatch an inbound [`ClientEvent`], or report a channel's
//! closure. Every operation here runs under a single `tokio::sync::Mutex`
//! guarding the User Directory, Presence Table, Pending Signal Queue, Call
//! Registry and timer map together, so cross-table steps (register,
//! disconnect, sweep) are atomic with respect to every other handler.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::call::{CallRecord, CallStatus};
use crate::clock;
use crate::directory::UserDirectory;
use crate::error::ClientError;
use crate::events::{ClientEvent, ServerEvent};
use crate::ids::{CallId, UserId};
use crate::pending::PendingSignalQueue;
use crate::presence::{PresenceEntry, PresenceStatus, PresenceTable};
use crate::registry::CallRegistry;
use crate::router;
use crate::transport::Channel;

/// Wire-visible timeouts (spec §6).
#[derive(Debug, Clone)]
pub struct CsmConfig {
    pub no_answer_timeout: Duration,
    pub offer_stall_timeout: Duration,
    pub candidate_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CsmConfig {
    fn default() -> Self {
        Self {
            no_answer_timeout: Duration::from_secs(60),
            offer_stall_timeout: Duration::from_secs(10),
            candidate_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

struct CsmState {
    directory: UserDirectory,
    presence: PresenceTable,
    pending: PendingSignalQueue,
    registry: CallRegistry,
}

impl CsmState {
    fn new() -> Self {
        Self {
            directory: UserDirectory::new(),
            presence: PresenceTable::new(),
            pending: PendingSignalQueue::new(),
            registry: CallRegistry::new(),
        }
    }
}

pub struct Csm {
    state: Mutex<CsmState>,
    config: CsmConfig,
}

/// A point-in-time view of the CSM's tables, for the `/health` snapshot
/// (spec §6).
pub struct Snapshot {
    pub connected_user_ids: Vec<UserId>,
    pub presence: std::collections::HashMap<UserId, PresenceEntry>,
    pub calls: Vec<CallSnapshot>,
}

pub struct CallSnapshot {
    pub call_id: CallId,
    pub participants: Vec<UserId>,
    pub bound_participants: Vec<UserId>,
    pub status: CallStatus,
}

impl Csm {
    pub fn new(config: CsmConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(CsmState::new()),
            config,
        })
    }

    // ---------------------------------------------------------------
    // User Directory (spec §4.1)
    // ---------------------------------------------------------------

    pub async fn register(self: &Arc<Self>, user_id: UserId, channel: Channel) {
        if !user_id.is_valid() {
            channel.send(ClientError::InvalidUser.into_event());
            return;
        }

        channel.set_bound_user_id(user_id.clone());
        let mut state = self.state.lock().await;

        if let Some(old) = state.directory.install(user_id.clone(), channel.clone()) {
            if old != channel {
                old.send(ServerEvent::ForceDisconnect {
                    message: "Replaced by a new connection".into(),
                });
                old.close();
            }
        }

        let presence = state.presence.get(&user_id);
        if presence.is_live_call() {
            // Preserve presence; refresh the call's cached channel in place
            // (spec §4.1: "retain presence ... update the call's
            // participant_channels[user_id] in place").
            if let Some(call_id) = presence.current_call_id.clone() {
                if let Some(call) = state.registry.get_mut(&call_id) {
                    call.bind_channel(user_id.clone(), channel.clone());
                }
            }
        } else {
            state.presence.set(user_id.clone(), PresenceEntry::available());
        }

        state.pending.drain(&user_id, &channel);
        channel.send(ServerEvent::Registered { success: true });
        info!(user_id = %user_id, "registered");
    }

    /// Called by the transport layer when a channel's underlying connection
    /// closes, whether cleanly or abruptly (spec §4.1 `unbind`, §4.3
    /// "transport disconnect").
    pub async fn disconnect(self: &Arc<Self>, channel: &Channel) {
        let Some(user_id) = channel.bound_user_id() else {
            return;
        };
        let mut state = self.state.lock().await;

        if !state.directory.unbind(&user_id, channel) {
            // Superseded by a newer registration; nothing to clean up.
            return;
        }

        let presence = state.presence.get(&user_id);
        if let Some(call_id) = presence.current_call_id.clone() {
            remove_from_call(&mut state, &call_id, &user_id, "User disconnected");
        }
        state.presence.set(user_id.clone(), PresenceEntry::offline());
        info!(user_id = %user_id, "disconnected");
    }

    // ---------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------

    pub async fn dispatch(self: &Arc<Self>, channel: &Channel, event: ClientEvent) {
        match event {
            ClientEvent::Register { user_id } => self.register(user_id, channel.clone()).await,
            ClientEvent::UserStatus { user_id, status } => {
                self.handle_user_status(user_id, status).await;
            }
            ClientEvent::CallInitiate {
                call_id,
                caller_id,
                receiver_ids,
                call_type,
                extra_meta,
            } => {
                self.handle_call_initiate(
                    channel,
                    call_id,
                    caller_id,
                    receiver_ids,
                    call_type,
                    extra_meta,
                )
                .await;
            }
            ClientEvent::CallAccept {
                call_id,
                receiver_id,
            } => self.handle_call_accept(channel, call_id, receiver_id).await,
            ClientEvent::CallReject { call_id, user_id } => {
                self.handle_call_reject(call_id, user_id).await;
            }
            ClientEvent::CallEnd { call_id, user_id } => {
                self.handle_call_end(call_id, user_id).await;
            }
            ClientEvent::UserReady { call_id, user_id } => {
                self.handle_user_ready(call_id, user_id).await;
            }
            ClientEvent::WebrtcOffer {
                call_id,
                from,
                to,
                sdp,
            } => {
                let mut state = self.state.lock().await;
                router::route_offer(
                    &mut state.registry,
                    &state.directory,
                    &mut state.pending,
                    call_id,
                    from,
                    to,
                    sdp,
                );
            }
            ClientEvent::WebrtcAnswer {
                call_id,
                from,
                to,
                sdp,
            } => {
                let mut state = self.state.lock().await;
                router::route_answer(
                    &mut state.registry,
                    &state.directory,
                    &mut state.pending,
                    call_id,
                    from,
                    to,
                    sdp,
                );
            }
            ClientEvent::IceCandidate {
                call_id,
                from,
                to,
                candidate,
            } => {
                let mut state = self.state.lock().await;
                router::route_candidate(
                    &mut state.registry,
                    &state.directory,
                    &mut state.pending,
                    call_id,
                    from,
                    to,
                    candidate,
                );
            }
        }
    }

    // ---------------------------------------------------------------
    // Call state machine (spec §4.3)
    // ---------------------------------------------------------------

    async fn handle_call_initiate(
        self: &Arc<Self>,
        channel: &Channel,
        call_id: CallId,
        caller_id: UserId,
        receiver_ids: Vec<UserId>,
        call_type: String,
        extra_meta: Option<Value>,
    ) {
        if !call_id.is_valid() || !caller_id.is_valid() || receiver_ids.is_empty() {
            channel.send(ClientError::InvalidCallData.into_event());
            return;
        }

        let mut state = self.state.lock().await;

        let Some(caller_channel) = state.directory.resolve(&caller_id) else {
            channel.send(ClientError::CallerNotConnected.into_event());
            return;
        };

        let receiver_id = receiver_ids[0].clone();
        let receiver_presence = state.presence.get(&receiver_id);
        if matches!(
            receiver_presence.status,
            PresenceStatus::Busy | PresenceStatus::InCall
        ) {
            caller_channel.send(ServerEvent::CallBusy {
                call_id,
                receiver_id,
            });
            return;
        }

        let mut record = CallRecord::new(
            call_id.clone(),
            caller_id.clone(),
            receiver_ids.clone(),
            call_type.clone(),
            extra_meta.clone(),
        );
        record.bind_channel(caller_id.clone(), caller_channel.clone());
        // Collision on initiate: insert() replaces any stale record and
        // cancels its timer (spec §4.3 "Collision on initiate").
        state.registry.insert(record);
        state
            .presence
            .set(caller_id.clone(), PresenceEntry::busy(call_id.clone()));

        let incoming = ServerEvent::IncomingCall {
            call_id: call_id.clone(),
            caller_id: caller_id.clone(),
            receiver_ids: receiver_ids.clone(),
            call_type,
            extra_meta,
        };
        if let Some(receiver_channel) = state.directory.resolve(&receiver_id) {
            state
                .presence
                .set(receiver_id.clone(), PresenceEntry::ringing(call_id.clone()));
            receiver_channel.send(incoming);
        } else {
            state.pending.enqueue(receiver_id.clone(), incoming);
        }

        caller_channel.send(ServerEvent::CallRinging {
            call_id: call_id.clone(),
            receiver_id,
        });

        self.arm_no_answer_timer(&mut state, call_id);
    }

    async fn handle_call_accept(
        self: &Arc<Self>,
        channel: &Channel,
        call_id: CallId,
        receiver_id: UserId,
    ) {
        let mut state = self.state.lock().await;

        let Some(call) = state.registry.get(&call_id) else {
            channel.send(ClientError::CallNotFound.into_event());
            return;
        };

        let is_declared =
            call.caller_id == receiver_id || call.receiver_ids.contains(&receiver_id);
        if !is_declared {
            channel.send(ClientError::InvalidReceiver.into_event());
            return;
        }

        let Some(receiver_channel) = state.directory.resolve(&receiver_id) else {
            channel.send(ClientError::ReceiverNotConnected.into_event());
            return;
        };

        if call.status == CallStatus::Active {
            // Idempotence (spec §4.3): re-bind the sender only, re-emit
            // `start_signaling` to the sender only.
            let call = state.registry.get_mut(&call_id).unwrap();
            call.bind_channel(receiver_id.clone(), receiver_channel.clone());
            receiver_channel.send(ServerEvent::StartSignaling {
                call_id: call_id.clone(),
            });
            return;
        }

        state.registry.timers.cancel(&call_id);
        let call = state.registry.get_mut(&call_id).unwrap();
        call.bind_channel(receiver_id.clone(), receiver_channel.clone());
        call.status = CallStatus::Active;
        let participants = call.participants.clone();

        for uid in &participants {
            state
                .presence
                .set(uid.clone(), PresenceEntry::in_call(call_id.clone()));
        }

        let call = state.registry.get(&call_id).unwrap();
        let accepted = ServerEvent::CallAccepted {
            call_id: call_id.clone(),
            receiver_id: receiver_id.clone(),
        };
        for uid in &participants {
            if *uid != receiver_id {
                if let Some(ch) = call.cached_channel(uid) {
                    ch.send(accepted.clone());
                }
            }
        }

        // §8 property 3: every bound participant observes `call_accepted`
        // (if applicable to them) strictly before `start_signaling`.
        let start = ServerEvent::StartSignaling {
            call_id: call_id.clone(),
        };
        for uid in &participants {
            if let Some(ch) = call.cached_channel(uid) {
                ch.send(start.clone());
            }
        }
    }

    async fn handle_call_reject(self: &Arc<Self>, call_id: CallId, user_id: UserId) {
        let mut state = self.state.lock().await;
        let Some(call) = state.registry.remove(&call_id) else {
            return; // unknown call id: silent no-op (spec §4.3 idempotence)
        };

        let rejected = ServerEvent::CallRejected {
            call_id: call_id.clone(),
            user_id,
        };
        if let Some(caller_channel) = state.directory.resolve(&call.caller_id) {
            caller_channel.send(rejected);
        } else {
            state.pending.enqueue(call.caller_id.clone(), rejected);
        }

        for uid in call.declared_users() {
            state.presence.set(uid, PresenceEntry::available());
        }
    }

    async fn handle_call_end(self: &Arc<Self>, call_id: CallId, user_id: UserId) {
        let mut state = self.state.lock().await;
        if remove_from_call(&mut state, &call_id, &user_id, "User ended the call") {
            state.presence.set(user_id, PresenceEntry::available());
        }
        // Unknown call id or `user_id` not a participant: silent no-op
        // (spec §4.3 idempotence).
    }

    async fn handle_user_ready(self: &Arc<Self>, call_id: CallId, user_id: UserId) {
        let mut state = self.state.lock().await;
        let Some(channel) = state.directory.resolve(&user_id) else {
            return;
        };
        let Some(call) = state.registry.get_mut(&call_id) else {
            return;
        };
        call.bind_channel(user_id, channel);

        if call.every_participant_bound() {
            let event = ServerEvent::StartSignaling {
                call_id: call_id.clone(),
            };
            for ch in call.bound_channels() {
                ch.send(event.clone());
            }
        }
    }

    async fn handle_user_status(self: &Arc<Self>, user_id: UserId, status: String) {
        let mut state = self.state.lock().await;
        let current = state.presence.get(&user_id);
        if current.is_live_call() {
            // A call owns this user's presence right now; an out-of-band
            // status update cannot override `ringing`/`busy`/`in-call`.
            return;
        }
        let entry = match status.as_str() {
            "available" => PresenceEntry::available(),
            "offline" => PresenceEntry::offline(),
            other => {
                warn!(user_id = %user_id, status = other, "ignoring unknown user_status value");
                return;
            }
        };
        state.presence.set(user_id, entry);
    }

    // ---------------------------------------------------------------
    // Group-call hooks (spec §2 item 6, §9 open question).
    //
    // Not reachable from the wire `ClientEvent` dispatch — §6 does not list
    // a `call_participant_*` transport event, and §9 notes these hooks are
    // "present but unused by the 1:1 flows". Exposed as a direct API for
    // embedders that need multi-party membership changes without the
    // 1:1-only wire surface.
    // ---------------------------------------------------------------

    pub async fn call_participant_add(
        self: &Arc<Self>,
        call_id: CallId,
        user_id: UserId,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        let Some(call) = state.registry.get_mut(&call_id) else {
            return Err(ClientError::CallNotFound);
        };
        let channel = state.directory.resolve(&user_id);
        call.add_participant(user_id.clone());
        if let Some(channel) = channel.clone() {
            call.participant_channels.insert(user_id.clone(), channel);
        }
        if call.status == CallStatus::Active {
            state
                .presence
                .set(user_id.clone(), PresenceEntry::in_call(call_id.clone()));
            if let Some(channel) = channel {
                channel.send(ServerEvent::StartSignaling { call_id });
            }
        }
        Ok(())
    }

    pub async fn call_participant_remove(
        self: &Arc<Self>,
        call_id: CallId,
        user_id: UserId,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        if remove_from_call(&mut state, &call_id, &user_id, "Removed from call") {
            state.presence.set(user_id, PresenceEntry::available());
            Ok(())
        } else {
            Err(ClientError::CallNotFound)
        }
    }

    // ---------------------------------------------------------------
    // Timers & Sweeper (spec §4.6, §9 "Timers")
    // ---------------------------------------------------------------

    fn arm_no_answer_timer(self: &Arc<Self>, state: &mut CsmState, call_id: CallId) {
        let csm = Arc::clone(self);
        let timeout = self.config.no_answer_timeout;
        let timer_call_id = call_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            csm.on_no_answer_timeout(timer_call_id).await;
        });
        state.registry.timers.arm(call_id, handle.abort_handle());
    }

    async fn on_no_answer_timeout(self: &Arc<Self>, call_id: CallId) {
        let mut state = self.state.lock().await;
        state.registry.timers.forget(&call_id);

        let Some(call) = state.registry.get(&call_id) else {
            return; // lost the race: already torn down
        };
        if call.status != CallStatus::Initiated {
            return; // lost the race: already accepted/rejected
        }

        timeout_call(&mut state, call_id, "No answer".to_string());
    }

    /// Sweeper tick (spec §4.6): offer-stall detection plus ICE buffer TTL
    /// enforcement, evaluated fresh every call.
    pub async fn sweep_once(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        let now = clock::now();
        let offer_stall = self.config.offer_stall_timeout;

        let stalled: Vec<CallId> = state
            .registry
            .snapshot()
            .iter()
            .filter(|(_, call)| {
                call.status == CallStatus::Initiated
                    && call.offer_attempts > 0
                    && call
                        .last_offer_time
                        .is_some_and(|t| now.saturating_duration_since(t) > offer_stall)
            })
            .map(|(call_id, _)| call_id.clone())
            .collect();

        for call_id in stalled {
            timeout_call(&mut state, call_id, "No answer from receiver".to_string());
        }

        router::trim_ice_buffers(&mut state.registry, self.config.candidate_ttl);
    }

    // ---------------------------------------------------------------
    // HTTP snapshot (spec §6)
    // ---------------------------------------------------------------

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        let calls = state
            .registry
            .snapshot()
            .values()
            .map(|call| CallSnapshot {
                call_id: call.call_id.clone(),
                participants: call.participants.clone(),
                bound_participants: call
                    .participants
                    .iter()
                    .filter(|id| call.cached_channel(id).is_some())
                    .cloned()
                    .collect(),
                status: call.status,
            })
            .collect();

        Snapshot {
            connected_user_ids: state.directory.connected_user_ids(),
            presence: state.presence.snapshot(),
            calls,
        }
    }
}

/// Shared by the 60 s no-answer timer and the offer-stall sweep (spec
/// §4.3): both terminate an `initiated` call the same way, differing only
/// in the `call_timeout` reason string.
fn timeout_call(state: &mut CsmState, call_id: CallId, call_timeout_reason: String) {
    let Some(call) = state.registry.remove(&call_id) else {
        return;
    };

    let timeout_event = ServerEvent::CallTimeout {
        call_id: call_id.clone(),
        reason: call_timeout_reason,
    };
    match call
        .cached_channel(&call.caller_id)
        .or_else(|| state.directory.resolve(&call.caller_id))
    {
        Some(channel) => {
            channel.send(timeout_event);
        }
        None => state.pending.enqueue(call.caller_id.clone(), timeout_event),
    }

    let ended_event = ServerEvent::CallEnded {
        call_id: call_id.clone(),
        user_id: UserId("system".into()),
        reason: "Timeout".into(),
    };
    for channel in call.bound_channels() {
        channel.send(ended_event.clone());
    }

    for uid in call.declared_users() {
        state.presence.set(uid, PresenceEntry::available());
    }
}

/// Remove `user_id` from `call_id`'s participants and broadcast
/// `call_ended` to whoever remains bound. Returns `false` (a no-op) when
/// the call is unknown or `user_id` is not currently a participant (spec
/// §4.3 idempotence for `call_end`).
///
/// A call's own §3 invariant ("`status = active` requires `|participants| >=
/// 2`") means dropping below two participants always terminates the call,
/// not just dropping to zero — this is what makes a 1:1 `call_end` actually
/// end the call for both sides (see DESIGN.md).
fn remove_from_call(state: &mut CsmState, call_id: &CallId, user_id: &UserId, reason: &str) -> bool {
    let Some(call) = state.registry.get_mut(call_id) else {
        return false;
    };
    if !call.participants.contains(user_id) {
        return false;
    }

    call.remove_participant(user_id);
    let remaining = call.participants.clone();

    let ended_event = ServerEvent::CallEnded {
        call_id: call_id.clone(),
        user_id: user_id.clone(),
        reason: reason.to_string(),
    };
    for channel in call.bound_channels() {
        channel.send(ended_event.clone());
    }

    if remaining.len() < 2 {
        // declared_users() covers a receiver who is still only `ringing`
        // (declared on the call but never added to `participants` — that
        // happens on `call_accept`, see call.rs), not just whoever was bound
        // at teardown time. Resetting only `remaining` would leave such a
        // receiver stuck at `ringing` against a now-deleted call id.
        let declared = call.declared_users();
        state.registry.remove(call_id);
        for uid in declared {
            state.presence.set(uid, PresenceEntry::available());
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId(id.to_string())
    }

    async fn register(csm: &Arc<Csm>, id: &str) -> (Channel, tokio::sync::mpsc::Receiver<ServerEvent>) {
        let (channel, mut rx) = Channel::new();
        csm.register(user(id), channel.clone()).await;
        assert_eq!(rx.recv().await, Some(ServerEvent::Registered { success: true }));
        (channel, rx)
    }

    #[tokio::test]
    async fn happy_path_initiate_accept_end() {
        let csm = Csm::new(CsmConfig::default());
        let (a, mut rx_a) = register(&csm, "A").await;
        let (b, mut rx_b) = register(&csm, "B").await;

        csm.dispatch(
            &a,
            ClientEvent::CallInitiate {
                call_id: CallId("c1".into()),
                caller_id: user("A"),
                receiver_ids: vec![user("B")],
                call_type: "audio".into(),
                extra_meta: None,
            },
        )
        .await;
        assert!(matches!(rx_b.recv().await, Some(ServerEvent::IncomingCall { .. })));
        assert!(matches!(rx_a.recv().await, Some(ServerEvent::CallRinging { .. })));

        csm.dispatch(
            &b,
            ClientEvent::CallAccept {
                call_id: CallId("c1".into()),
                receiver_id: user("B"),
            },
        )
        .await;
        assert!(matches!(rx_a.recv().await, Some(ServerEvent::CallAccepted { .. })));
        assert!(matches!(rx_a.recv().await, Some(ServerEvent::StartSignaling { .. })));
        assert!(matches!(rx_b.recv().await, Some(ServerEvent::StartSignaling { .. })));

        csm.dispatch(
            &a,
            ClientEvent::CallEnd {
                call_id: CallId("c1".into()),
                user_id: user("A"),
            },
        )
        .await;
        match rx_b.recv().await {
            Some(ServerEvent::CallEnded { user_id, .. }) => assert_eq!(user_id, user("A")),
            other => panic!("expected call_ended, got {other:?}"),
        }

        let snapshot = csm.snapshot().await;
        assert!(snapshot.calls.is_empty());
        assert_eq!(
            snapshot.presence.get(&user("A")).unwrap().status,
            PresenceStatus::Available
        );
        assert_eq!(
            snapshot.presence.get(&user("B")).unwrap().status,
            PresenceStatus::Available
        );
    }

    #[tokio::test]
    async fn call_initiate_against_an_in_call_receiver_is_refused() {
        let csm = Csm::new(CsmConfig::default());
        let (a, mut rx_a) = register(&csm, "A").await;
        let (b, _rx_b) = register(&csm, "B").await;
        let (c, mut rx_c) = register(&csm, "C").await;

        csm.dispatch(
            &a,
            ClientEvent::CallInitiate {
                call_id: CallId("c1".into()),
                caller_id: user("A"),
                receiver_ids: vec![user("B")],
                call_type: "audio".into(),
                extra_meta: None,
            },
        )
        .await;
        let _ = rx_a.recv().await; // call_ringing

        csm.dispatch(
            &b,
            ClientEvent::CallAccept {
                call_id: CallId("c1".into()),
                receiver_id: user("B"),
            },
        )
        .await;
        // Drain A's call_accepted/start_signaling; B is now `in_call`.
        let _ = rx_a.recv().await;
        let _ = rx_a.recv().await;

        csm.dispatch(
            &c,
            ClientEvent::CallInitiate {
                call_id: CallId("c2".into()),
                caller_id: user("C"),
                receiver_ids: vec![user("B")],
                call_type: "audio".into(),
                extra_meta: None,
            },
        )
        .await;

        match rx_c.recv().await {
            Some(ServerEvent::CallBusy { receiver_id, .. }) => assert_eq!(receiver_id, user("B")),
            other => panic!("expected call_busy, got {other:?}"),
        }
        assert!(csm.snapshot().await.calls.iter().all(|c| c.call_id != CallId("c2".into())));
    }

    #[tokio::test]
    async fn no_answer_timeout_ends_an_unaccepted_call() {
        tokio::time::pause();
        let csm = Csm::new(CsmConfig::default());
        let (a, mut rx_a) = register(&csm, "A").await;
        let (_b, _rx_b) = register(&csm, "B").await;

        csm.dispatch(
            &a,
            ClientEvent::CallInitiate {
                call_id: CallId("c1".into()),
                caller_id: user("A"),
                receiver_ids: vec![user("B")],
                call_type: "audio".into(),
                extra_meta: None,
            },
        )
        .await;
        let _ = rx_a.recv().await; // call_ringing

        tokio::time::advance(std::time::Duration::from_secs(61)).await;
        // Let the spawned timer task actually run past its sleep.
        tokio::task::yield_now().await;

        match rx_a.recv().await {
            Some(ServerEvent::CallTimeout { reason, .. }) => assert_eq!(reason, "No answer"),
            other => panic!("expected call_timeout, got {other:?}"),
        }
        assert!(csm.snapshot().await.calls.is_empty());
    }

    #[tokio::test]
    async fn call_reject_notifies_the_caller_and_frees_both_users() {
        let csm = Csm::new(CsmConfig::default());
        let (a, mut rx_a) = register(&csm, "A").await;
        let (b, _rx_b) = register(&csm, "B").await;

        csm.dispatch(
            &a,
            ClientEvent::CallInitiate {
                call_id: CallId("c1".into()),
                caller_id: user("A"),
                receiver_ids: vec![user("B")],
                call_type: "audio".into(),
                extra_meta: None,
            },
        )
        .await;
        let _ = rx_a.recv().await; // call_ringing

        csm.dispatch(
            &b,
            ClientEvent::CallReject {
                call_id: CallId("c1".into()),
                user_id: user("B"),
            },
        )
        .await;

        assert!(matches!(rx_a.recv().await, Some(ServerEvent::CallRejected { .. })));
        let snapshot = csm.snapshot().await;
        assert!(snapshot.calls.is_empty());
        assert_eq!(
            snapshot.presence.get(&user("A")).unwrap().status,
            PresenceStatus::Available
        );
        assert_eq!(
            snapshot.presence.get(&user("B")).unwrap().status,
            PresenceStatus::Available
        );
    }

    #[tokio::test]
    async fn disconnecting_the_registered_channel_clears_presence() {
        let csm = Csm::new(CsmConfig::default());
        let (a, _rx_a) = register(&csm, "A").await;
        csm.disconnect(&a).await;

        let snapshot = csm.snapshot().await;
        assert!(snapshot.connected_user_ids.is_empty());
        assert_eq!(
            snapshot.presence.get(&user("A")).unwrap().status,
            PresenceStatus::Offline
        );
    }

    #[tokio::test]
    async fn caller_disconnect_while_receiver_is_still_ringing_frees_the_receiver() {
        let csm = Csm::new(CsmConfig::default());
        let (a, mut rx_a) = register(&csm, "A").await;
        let (_b, _rx_b) = register(&csm, "B").await;

        csm.dispatch(
            &a,
            ClientEvent::CallInitiate {
                call_id: CallId("c1".into()),
                caller_id: user("A"),
                receiver_ids: vec![user("B")],
                call_type: "audio".into(),
                extra_meta: None,
            },
        )
        .await;
        let _ = rx_a.recv().await; // call_ringing

        // B never accepts: B is only `declared`, not yet a `participant`.
        csm.disconnect(&a).await;

        let snapshot = csm.snapshot().await;
        assert!(snapshot.calls.is_empty());
        assert_eq!(
            snapshot.presence.get(&user("B")).unwrap().status,
            PresenceStatus::Available
        );
    }
}
