//! Pending Signal Queue (spec §4.2).
//!
//! Per-user FIFO mailbox for server events that arrived while the recipient
//! had no live channel. Queues are created lazily and removed on drain; the
//! baseline has no cap (spec §4.2).

use std::collections::{HashMap, VecDeque};

use crate::events::ServerEvent;
use crate::ids::UserId;
use crate::transport::Channel;

#[derive(Debug, Default)]
pub struct PendingSignalQueue {
    queues: HashMap<UserId, VecDeque<ServerEvent>>,
}

impl PendingSignalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, user_id: UserId, event: ServerEvent) {
        self.queues.entry(user_id).or_default().push_back(event);
    }

    /// Send every queued entry for `user_id`, in insertion order, and clear
    /// the queue. Called atomically with registration (spec §5).
    pub fn drain(&mut self, user_id: &UserId, channel: &Channel) {
        if let Some(queue) = self.queues.remove(user_id) {
            for event in queue {
                channel.send(event);
            }
        }
    }

    pub fn len(&self, user_id: &UserId) -> usize {
        self.queues.get(user_id).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_delivers_in_fifo_order_and_clears_the_queue() {
        let mut pending = PendingSignalQueue::new();
        let user = UserId("D".into());
        pending.enqueue(
            user.clone(),
            ServerEvent::CallRinging {
                call_id: crate::ids::CallId("c1".into()),
                receiver_id: user.clone(),
            },
        );
        pending.enqueue(user.clone(), ServerEvent::Registered { success: true });

        let (channel, mut rx) = Channel::new();
        pending.drain(&user, &channel);

        assert_eq!(pending.len(&user), 0);
        match rx.recv().await.unwrap() {
            ServerEvent::CallRinging { .. } => {}
            other => panic!("expected CallRinging first, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            ServerEvent::Registered { success: true } => {}
            other => panic!("expected Registered second, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn drain_on_empty_queue_is_a_noop() {
        let mut pending = PendingSignalQueue::new();
        let (channel, mut rx) = Channel::new();
        pending.drain(&UserId("ghost".into()), &channel);
        drop(channel);
        assert!(rx.recv().await.is_none());
    }
}
