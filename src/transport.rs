//! Transport channel abstraction (spec §3 "Transport channel", §5 "Suspension
//! / blocking").
//!
//! The CSM never talks to a socket directly. It talks to a [`Channel`]: a
//! cheaply-cloned handle over a bounded `mpsc` queue that the transport layer
//! (`http.rs`'s websocket upgrade) drains into the real connection. `send` is
//! non-blocking from the handler's perspective — per §5, if the queue is
//! full the event is simply dropped for that recipient, who recovers via
//! `user_ready` or a pending-queue drain on reconnect.

use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::events::ServerEvent;
use crate::ids::UserId;

/// Outbound queue depth before `send` starts dropping events for a channel.
const CHANNEL_BUFFER: usize = 64;

struct ChannelInner {
    id: Uuid,
    sender: mpsc::Sender<ServerEvent>,
    closer: Notify,
    bound_user_id: StdMutex<Option<UserId>>,
}

/// A transport-assigned handle, distinct from any user id (spec §3).
#[derive(Clone)]
pub struct Channel(Arc<ChannelInner>);

impl Channel {
    /// Create a new channel and the receiver the transport layer drains.
    pub fn new() -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER);
        let channel = Self(Arc::new(ChannelInner {
            id: Uuid::new_v4(),
            sender,
            closer: Notify::new(),
            bound_user_id: StdMutex::new(None),
        }));
        (channel, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }

    /// Send is fire-and-forget: a full or closed queue silently drops the
    /// event rather than blocking the caller (spec §5).
    pub fn send(&self, event: ServerEvent) -> bool {
        self.0.sender.try_send(event).is_ok()
    }

    /// Ask the transport layer to tear down the underlying connection. The
    /// transport task observes this via [`Channel::closed`].
    pub fn close(&self) {
        self.0.closer.notify_waiters();
    }

    /// Resolves once [`Channel::close`] has been called.
    pub async fn closed(&self) {
        self.0.closer.notified().await;
    }

    pub fn bound_user_id(&self) -> Option<UserId> {
        self.0.bound_user_id.lock().unwrap().clone()
    }

    pub fn set_bound_user_id(&self, user_id: UserId) {
        *self.0.bound_user_id.lock().unwrap() = Some(user_id);
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Channel {}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("id", &self.0.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distinct_channels_are_not_equal() {
        let (a, _rx_a) = Channel::new();
        let (b, _rx_b) = Channel::new();
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[tokio::test]
    async fn send_delivers_to_the_receiver() {
        let (channel, mut rx) = Channel::new();
        assert!(channel.send(ServerEvent::Registered { success: true }));
        assert_eq!(rx.recv().await, Some(ServerEvent::Registered { success: true }));
    }

    #[tokio::test]
    async fn send_drops_silently_once_the_receiver_is_gone() {
        let (channel, rx) = Channel::new();
        drop(rx);
        assert!(!channel.send(ServerEvent::Registered { success: true }));
    }

    #[tokio::test]
    async fn close_wakes_the_closed_future() {
        let (channel, _rx) = Channel::new();
        let waiter = channel.clone();
        let handle = tokio::spawn(async move {
            waiter.closed().await;
        });
        channel.close();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn bound_user_id_round_trips() {
        let (channel, _rx) = Channel::new();
        assert_eq!(channel.bound_user_id(), None);
        channel.set_bound_user_id(UserId("A".into()));
        assert_eq!(channel.bound_user_id(), Some(UserId("A".into())));
    }
}
