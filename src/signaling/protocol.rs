//! Signaling wire protocol
//!
//! Every frame is a JSON object `{"type": <tag>, "data": {...}}`. Inbound
//! frames are validated into [`ClientFrame`] at the boundary; anything that
//! does not fit is reported as `MalformedFrame`. SDP and ICE payloads are
//! opaque JSON values forwarded verbatim.

use super::SignalingError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames received from participants and relays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientFrame {
    /// Announce identity for this connection
    Join { user_id: String },

    /// Claim the primary relay slot
    DeclarePrimaryRelay {
        #[serde(default)]
        token: Option<String>,
    },

    /// Claim the secondary relay slot
    DeclareSecondaryRelay {
        #[serde(default)]
        token: Option<String>,
    },

    /// Enter a room and ask the primary relay to add a peer
    Start { room_id: String, user_id: String },

    /// Primary relay acknowledged `add-peer`
    RelayAckAddPeer { room_id: String, index: usize },

    /// Participant SDP offer for the primary relay
    Offer {
        room_id: String,
        user_id: String,
        sdp_offer: Value,
    },

    /// Primary relay SDP answer for a participant
    Answer {
        room_id: String,
        index: usize,
        sdp_answer: Value,
    },

    /// Participant ICE candidate for the primary relay
    IceCandidate {
        room_id: String,
        user_id: String,
        candidate: Value,
    },

    /// Primary relay ICE candidate for a participant
    IceCandidateAck {
        room_id: String,
        index: usize,
        candidate: Value,
    },

    /// Secondary relay SDP offer for a participant
    OfferSecondary {
        room_id: String,
        index: usize,
        sdp_offer: Value,
    },

    /// Participant SDP answer for the secondary relay
    AnswerSecondary {
        room_id: String,
        user_id: String,
        sdp_answer: Value,
    },

    /// Secondary relay ICE candidate for a participant
    IceCandidateSecondaryAck {
        room_id: String,
        index: usize,
        candidate: Value,
    },

    /// Participant ICE candidate for the secondary relay
    IceCandidateSecondary {
        room_id: String,
        user_id: String,
        candidate: Value,
    },

    /// Leave a room; the user's peer slots are tombstoned
    Leave { room_id: String, user_id: String },

    /// Application-level keepalive
    Heartbeat {},
}

impl ClientFrame {
    /// Wire tag of this frame
    pub fn tag(&self) -> &'static str {
        match self {
            ClientFrame::Join { .. } => "join",
            ClientFrame::DeclarePrimaryRelay { .. } => "declare-primary-relay",
            ClientFrame::DeclareSecondaryRelay { .. } => "declare-secondary-relay",
            ClientFrame::Start { .. } => "start",
            ClientFrame::RelayAckAddPeer { .. } => "relay-ack-add-peer",
            ClientFrame::Offer { .. } => "offer",
            ClientFrame::Answer { .. } => "answer",
            ClientFrame::IceCandidate { .. } => "ice-candidate",
            ClientFrame::IceCandidateAck { .. } => "ice-candidate-ack",
            ClientFrame::OfferSecondary { .. } => "offer-secondary",
            ClientFrame::AnswerSecondary { .. } => "answer-secondary",
            ClientFrame::IceCandidateSecondaryAck { .. } => "ice-candidate-secondary-ack",
            ClientFrame::IceCandidateSecondary { .. } => "ice-candidate-secondary",
            ClientFrame::Leave { .. } => "leave",
            ClientFrame::Heartbeat {} => "heartbeat",
        }
    }

    /// Parse one text frame, rejecting anything larger than `max_bytes`
    pub fn parse(text: &str, max_bytes: usize) -> Result<Self, SignalingError> {
        if text.len() > max_bytes {
            return Err(SignalingError::MalformedFrame(format!(
                "frame of {} bytes exceeds limit of {} bytes",
                text.len(),
                max_bytes
            )));
        }

        let mut value: Value = serde_json::from_str(text.trim())
            .map_err(|e| SignalingError::MalformedFrame(format!("invalid JSON: {}", e)))?;

        let object = value
            .as_object_mut()
            .ok_or_else(|| SignalingError::MalformedFrame("frame is not a JSON object".to_string()))?;

        match object.get("type") {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(SignalingError::MalformedFrame(
                    "frame type must be a string".to_string(),
                ))
            }
            None => return Err(SignalingError::MalformedFrame("missing frame type".to_string())),
        }

        // Tags without required fields may omit `data` entirely
        match object.get("data") {
            None | Some(Value::Null) => {
                object.insert("data".to_string(), Value::Object(Default::default()));
            }
            _ => {}
        }

        serde_json::from_value(value).map_err(|e| SignalingError::MalformedFrame(e.to_string()))
    }
}

/// Error kinds surfaced to the sender in an `error` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    NotReady,
    MalformedFrame,
    Unauthorized,
    Conflict,
}

/// Frames emitted by the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerFrame {
    /// Presence change
    Status { user_id: String, online: bool },

    /// Ask the primary relay to set up a peer
    AddPeer { room_id: String, index: usize },

    /// Tell a participant its relay peer is ready
    Start { room_id: String, index: usize },

    Offer {
        room_id: String,
        index: usize,
        sdp_offer: Value,
    },

    AnswerReady { sdp_answer: Value },

    IceCandidateRelay {
        room_id: String,
        index: usize,
        candidate: Value,
    },

    IceCandidateDeliver { candidate: Value },

    OfferSecondary { sdp_offer: Value },

    AnswerSecondary {
        room_id: String,
        index: usize,
        sdp_answer: Value,
    },

    IceCandidateSecondaryDeliver { candidate: Value },

    IceCandidateSecondaryRelay {
        room_id: String,
        index: usize,
        candidate: Value,
    },

    HeartbeatAck,

    /// Tell the primary relay a peer slot was tombstoned
    RemovePeer { room_id: String, index: usize },

    /// Acknowledge a `leave` with the tombstoned indices
    Left { room_id: String, indices: Vec<usize> },

    Error { kind: ErrorKind, message: String },
}

impl ServerFrame {
    /// Build the `error` frame for a reportable signaling error
    pub fn error(err: &SignalingError) -> Option<Self> {
        err.kind().map(|kind| ServerFrame::Error {
            kind,
            message: err.message().to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LIMIT: usize = 64 * 1024;

    #[test]
    fn test_parse_offer() {
        let text = r#"{"type":"offer","data":{"roomId":"study-1","userId":"alice","sdpOffer":"v=0"}}"#;
        let frame = ClientFrame::parse(text, LIMIT).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Offer {
                room_id: "study-1".to_string(),
                user_id: "alice".to_string(),
                sdp_offer: json!("v=0"),
            }
        );
        assert_eq!(frame.tag(), "offer");
    }

    #[test]
    fn test_parse_tag_without_data() {
        let frame = ClientFrame::parse(r#"{"type":"heartbeat"}"#, LIMIT).unwrap();
        assert_eq!(frame, ClientFrame::Heartbeat {});

        let frame = ClientFrame::parse(r#"{"type":"declare-primary-relay","data":null}"#, LIMIT).unwrap();
        assert_eq!(frame, ClientFrame::DeclarePrimaryRelay { token: None });
    }

    #[test]
    fn test_object_payloads_are_kept_verbatim() {
        let candidate = json!({"candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host", "sdpMid": "0", "sdpMLineIndex": 0});
        let text = json!({
            "type": "ice-candidate-ack",
            "data": {"roomId": "r", "index": 3, "candidate": candidate.clone()}
        })
        .to_string();
        match ClientFrame::parse(&text, LIMIT).unwrap() {
            ClientFrame::IceCandidateAck { index, candidate: parsed, .. } => {
                assert_eq!(index, 3);
                assert_eq!(parsed, candidate);
            }
            other => panic!("Expected IceCandidateAck, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_frames() {
        let cases = [
            "not json",
            "[1,2,3]",
            r#"{"data":{}}"#,
            r#"{"type":7}"#,
            r#"{"type":"teleport","data":{}}"#,
            r#"{"type":"start","data":{"roomId":"r"}}"#,
            r#"{"type":"answer","data":{"roomId":"r","index":-1,"sdpAnswer":"x"}}"#,
            r#"{"type":"offer","data":{"roomId":"r","userId":"u"}}"#,
        ];
        for text in cases {
            match ClientFrame::parse(text, LIMIT) {
                Err(SignalingError::MalformedFrame(_)) => {}
                other => panic!("Expected MalformedFrame for {}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let text = format!(r#"{{"type":"join","data":{{"userId":"{}"}}}}"#, "x".repeat(128));
        assert!(matches!(
            ClientFrame::parse(&text, 64),
            Err(SignalingError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_server_frame_shape() {
        let frame = ServerFrame::Offer {
            room_id: "study-1".to_string(),
            index: 0,
            sdp_offer: json!("X"),
        };
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "offer", "data": {"roomId": "study-1", "index": 0, "sdpOffer": "X"}})
        );

        let ack: Value = serde_json::from_str(&ServerFrame::HeartbeatAck.to_json().unwrap()).unwrap();
        assert_eq!(ack, json!({"type": "heartbeat-ack"}));
    }

    #[test]
    fn test_error_frame() {
        let frame = ServerFrame::error(&SignalingError::NotReady("no primary relay".to_string())).unwrap();
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["kind"], "NotReady");
        assert_eq!(value["data"]["message"], "no primary relay");
    }
}
