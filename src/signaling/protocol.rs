//! JSON wire protocol shared between the router and browser clients.
//!
//! One JSON object per WebSocket text frame. Fields that are absent are
//! omitted from the serialized output entirely, keeping frames compact.

use serde::{Deserialize, Serialize};

/// Closed vocabulary of signaling frame types.
///
/// REGISTER, PING and SIGNAL are sent by clients; PONG, SUCCESS, ERROR and
/// USER_NOT_FOUND are server responses. A client frame carrying a response
/// type is rejected by the router as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Register,
    Ping,
    Signal,
    Pong,
    Success,
    Error,
    UserNotFound,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageType::Register => "REGISTER",
            MessageType::Ping => "PING",
            MessageType::Signal => "SIGNAL",
            MessageType::Pong => "PONG",
            MessageType::Success => "SUCCESS",
            MessageType::Error => "ERROR",
            MessageType::UserNotFound => "USER_NOT_FOUND",
        };
        f.write_str(name)
    }
}

/// One signaling frame. Immutable once decoded.
///
/// `payload` is the peer's opaque negotiation blob (SDP offers/answers, ICE
/// candidates, whatever the clients agree on); the server forwards it
/// verbatim and never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SignalingMessage {
    fn empty(message_type: MessageType) -> Self {
        Self {
            message_type,
            user_id: None,
            target_user_id: None,
            from_user_id: None,
            payload: None,
            message: None,
        }
    }

    /// SUCCESS response echoing the id the registration was accepted under.
    pub fn success(user_id: &str, text: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            message: Some(text.to_string()),
            ..Self::empty(MessageType::Success)
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::empty(MessageType::Error)
        }
    }

    pub fn pong() -> Self {
        Self {
            message: Some("pong".to_string()),
            ..Self::empty(MessageType::Pong)
        }
    }

    /// USER_NOT_FOUND response, echoing the unreachable target back to the
    /// sender. An offline target and a stale binding look identical here.
    pub fn user_not_found(target_user_id: &str) -> Self {
        Self {
            target_user_id: Some(target_user_id.to_string()),
            message: Some(format!("user '{target_user_id}' is not online")),
            ..Self::empty(MessageType::UserNotFound)
        }
    }

    /// The frame delivered to a SIGNAL's target. `from_user_id` is always the
    /// registry-resolved sender, never anything the client supplied.
    pub fn forwarded_signal(from_user_id: &str, payload: Option<serde_json::Value>) -> Self {
        Self {
            from_user_id: Some(from_user_id.to_string()),
            payload,
            ..Self::empty(MessageType::Signal)
        }
    }
}
