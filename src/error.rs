//! Client-surfaced error kinds (spec §7).
//!
//! Mirrors the teacher's split between a `thiserror` enum that implements
//! `IntoResponse`-style conversion for the client-facing cases
//! (`voice/call_service.rs::CallError`) and bare `tracing` calls for
//! server-visible-only conditions, which never get their own variant here.

use thiserror::Error;

use crate::events::ServerEvent;

/// Errors surfaced to the client via the wire `error{message}` event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("invalid_user")]
    InvalidUser,
    #[error("invalid_call_data")]
    InvalidCallData,
    #[error("caller_not_connected")]
    CallerNotConnected,
    #[error("call_not_found")]
    CallNotFound,
    #[error("receiver_not_connected")]
    ReceiverNotConnected,
    #[error("invalid_receiver")]
    InvalidReceiver,
}

impl ClientError {
    /// Wire code sent in `error{message}` — matches the variant's `Display`.
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn into_event(self) -> ServerEvent {
        ServerEvent::Error {
            message: self.message(),
        }
    }
}
