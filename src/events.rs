//! Wire event types (spec §6).
//!
//! Concrete, `serde`-tagged enums for every transport event name the spec
//! lists, in the style of `voice/signaling.rs::SignalingMessage`: a `type`/
//! `event` tag plus `camelCase` payload fields, matching the JSON shown in
//! spec §6 and the S1–S6 scenarios.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CallId, UserId};

/// Events accepted from a client connection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Register {
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    UserStatus {
        #[serde(rename = "userId")]
        user_id: UserId,
        status: String,
    },
    CallInitiate {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "callerId")]
        caller_id: UserId,
        #[serde(rename = "receiverIds")]
        receiver_ids: Vec<UserId>,
        #[serde(rename = "callType")]
        call_type: String,
        #[serde(rename = "extraMeta", default)]
        extra_meta: Option<Value>,
    },
    CallAccept {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "receiverId")]
        receiver_id: UserId,
    },
    CallReject {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    CallEnd {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    UserReady {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    WebrtcOffer {
        #[serde(rename = "callId")]
        call_id: CallId,
        from: UserId,
        to: UserId,
        sdp: String,
    },
    WebrtcAnswer {
        #[serde(rename = "callId")]
        call_id: CallId,
        from: UserId,
        to: UserId,
        sdp: String,
    },
    IceCandidate {
        #[serde(rename = "callId")]
        call_id: CallId,
        from: UserId,
        to: UserId,
        candidate: String,
    },
}

/// Events emitted to a client connection.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Registered {
        success: bool,
    },
    Error {
        message: String,
    },
    ForceDisconnect {
        message: String,
    },
    IncomingCall {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "callerId")]
        caller_id: UserId,
        #[serde(rename = "receiverIds")]
        receiver_ids: Vec<UserId>,
        #[serde(rename = "callType")]
        call_type: String,
        #[serde(rename = "extraMeta", skip_serializing_if = "Option::is_none")]
        extra_meta: Option<Value>,
    },
    CallRinging {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "receiverId")]
        receiver_id: UserId,
    },
    CallBusy {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "receiverId")]
        receiver_id: UserId,
    },
    CallAccepted {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "receiverId")]
        receiver_id: UserId,
    },
    CallRejected {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    CallTimeout {
        #[serde(rename = "callId")]
        call_id: CallId,
        reason: String,
    },
    CallEnded {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "userId")]
        user_id: UserId,
        reason: String,
    },
    StartSignaling {
        #[serde(rename = "callId")]
        call_id: CallId,
    },
    WebrtcOffer {
        #[serde(rename = "callId")]
        call_id: CallId,
        from: UserId,
        sdp: String,
    },
    WebrtcAnswer {
        #[serde(rename = "callId")]
        call_id: CallId,
        from: UserId,
        sdp: String,
    },
    IceCandidate {
        #[serde(rename = "callId")]
        call_id: CallId,
        from: UserId,
        candidate: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_parses_call_initiate() {
        let json = r#"{
            "event": "call_initiate",
            "callId": "c1",
            "callerId": "A",
            "receiverIds": ["B"],
            "callType": "audio"
        }"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ClientEvent::CallInitiate {
                call_id: CallId("c1".into()),
                caller_id: UserId("A".into()),
                receiver_ids: vec![UserId("B".into())],
                call_type: "audio".into(),
                extra_meta: None,
            }
        );
    }

    #[test]
    fn webrtc_offer_strips_to_field_on_the_wire() {
        let event = ServerEvent::WebrtcOffer {
            call_id: CallId("c1".into()),
            from: UserId("A".into()),
            sdp: "sdp-o".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("to").is_none());
        assert_eq!(json["from"], "A");
        assert_eq!(json["sdp"], "sdp-o");
    }

    #[test]
    fn registered_event_round_trips() {
        let event = ServerEvent::Registered { success: true };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"registered","success":true}"#);
    }
}
