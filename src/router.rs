//! Signal Router (spec §2 item 7, §4.4).
//!
//! Routes `offer`/`answer`/`candidate` between participants, buffering
//! recent ICE candidates and tracking offer retry accounting. Payloads are
//! opaque: this module never inspects or rewrites `sdp`/`candidate`, only the
//! envelope (`call_id`, `from`, `to`).

use tracing::{debug, trace};

use crate::call::IceCandidateEntry;
use crate::clock;
use crate::directory::UserDirectory;
use crate::events::ServerEvent;
use crate::ids::{CallId, UserId};
use crate::pending::PendingSignalQueue;
use crate::registry::CallRegistry;
use crate::transport::Channel;

/// Resolve the live channel for `to`, preferring the call's cached binding
/// (spec §4.1 "weak cache", §4.4 step 2) and falling back to the directory.
fn resolve_target(
    registry: &CallRegistry,
    directory: &UserDirectory,
    call_id: &CallId,
    to: &UserId,
) -> Option<Channel> {
    if let Some(call) = registry.get(call_id) {
        if let Some(channel) = call.cached_channel(to) {
            return Some(channel);
        }
    }
    directory.resolve(to)
}

/// Deliver `event` to `to`, falling back to the pending queue when the
/// recipient has no live channel — or when its queue is momentarily full,
/// which the CSM treats the same way a stale channel would be (spec §4.4
/// step 4 covers "not resolved"; a full outbound queue is functionally
/// identical from the recipient's point of view).
fn deliver_or_enqueue(
    registry: &CallRegistry,
    directory: &UserDirectory,
    pending: &mut PendingSignalQueue,
    call_id: &CallId,
    to: &UserId,
    event: ServerEvent,
) {
    match resolve_target(registry, directory, call_id, to) {
        Some(channel) if channel.send(event.clone()) => {
            trace!(call_id = %call_id, to = %to, "signal delivered");
        }
        _ => {
            debug!(call_id = %call_id, to = %to, "signal target offline, enqueuing");
            pending.enqueue(to.clone(), event);
        }
    }
}

pub fn route_offer(
    registry: &mut CallRegistry,
    directory: &UserDirectory,
    pending: &mut PendingSignalQueue,
    call_id: CallId,
    from: UserId,
    to: UserId,
    sdp: String,
) {
    if from == to {
        debug!(call_id = %call_id, user = %from, "dropping offer loopback");
        return;
    }

    if let Some(call) = registry.get_mut(&call_id) {
        call.offer_attempts += 1;
        call.last_offer_time = Some(clock::now());
    }

    let event = ServerEvent::WebrtcOffer {
        call_id: call_id.clone(),
        from,
        sdp,
    };
    deliver_or_enqueue(registry, directory, pending, &call_id, &to, event);
}

pub fn route_answer(
    registry: &mut CallRegistry,
    directory: &UserDirectory,
    pending: &mut PendingSignalQueue,
    call_id: CallId,
    from: UserId,
    to: UserId,
    sdp: String,
) {
    if from == to {
        debug!(call_id = %call_id, user = %from, "dropping answer loopback");
        return;
    }

    if let Some(call) = registry.get_mut(&call_id) {
        call.offer_attempts = 0;
    }

    let event = ServerEvent::WebrtcAnswer {
        call_id: call_id.clone(),
        from,
        sdp,
    };
    deliver_or_enqueue(registry, directory, pending, &call_id, &to, event);
}

pub fn route_candidate(
    registry: &mut CallRegistry,
    directory: &UserDirectory,
    pending: &mut PendingSignalQueue,
    call_id: CallId,
    from: UserId,
    to: UserId,
    candidate: String,
) {
    if from == to {
        debug!(call_id = %call_id, user = %from, "dropping candidate loopback");
        return;
    }

    if let Some(call) = registry.get_mut(&call_id) {
        call.ice_buffer
            .entry(to.clone())
            .or_default()
            .push(IceCandidateEntry {
                from: from.clone(),
                candidate: candidate.clone(),
                ts: clock::now(),
            });
    }

    let event = ServerEvent::IceCandidate {
        call_id: call_id.clone(),
        from,
        candidate,
    };
    deliver_or_enqueue(registry, directory, pending, &call_id, &to, event);
}

/// Drop buffered candidates older than `ttl` across every call (spec §4.6).
pub fn trim_ice_buffers(registry: &mut CallRegistry, ttl: std::time::Duration) {
    let now = clock::now();
    for (_, call) in registry.iter_mut() {
        for entries in call.ice_buffer.values_mut() {
            entries.retain(|entry| now.saturating_duration_since(entry.ts) < ttl);
        }
        call.ice_buffer.retain(|_, entries| !entries.is_empty());
    }
}
