//! Wire envelopes
//!
//! Every frame on the wire is one JSON object with a `type` field:
//!
//! - `chat`: `{"type":"chat","from":..,"to":..,"content":..,"isPrivate":..}`,
//!   where `to` is only present for directed messages
//! - `setname`: `{"type":"setname","nickname":..}`, inbound only
//! - `userlist`: `{"type":"userlist","nicknames":[..]}`, outbound only

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::DecodeError;

/// A pre-encoded outbound envelope. Cloning is a refcount bump, so one
/// encoded message can be fanned out to every mailbox.
pub type Frame = Arc<str>;

/// A chat message as routed by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub content: String,
    pub is_private: bool,
}

impl ChatMessage {
    /// A message for every connected client.
    pub fn broadcast(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: None,
            content: content.into(),
            is_private: false,
        }
    }

    /// A message for the client whose identity equals `to`.
    pub fn directed(
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let to = to.into();
        let is_private = !to.is_empty();
        Self {
            from: from.into(),
            to: is_private.then_some(to),
            content: content.into(),
            is_private,
        }
    }

    /// The directed recipient, if this is a private message.
    pub fn recipient(&self) -> Option<&str> {
        if self.is_private {
            self.to.as_deref()
        } else {
            None
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    SetName { nickname: String },
    Chat(ChatMessage),
}

#[derive(Deserialize)]
struct RawChat {
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Outbound<'a> {
    Chat(&'a ChatMessage),
    Userlist { nicknames: &'a [String] },
}

/// Decode one inbound text frame.
///
/// The `isPrivate` flag sent by the client is ignored: a message is private
/// exactly when it names a non-empty `to`.
pub fn decode_inbound(text: &str) -> Result<Inbound, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let kind = object
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    match kind {
        "setname" => {
            let nickname = object
                .get("nickname")
                .and_then(|n| n.as_str())
                .ok_or(DecodeError::MissingNickname)?;
            Ok(Inbound::SetName {
                nickname: nickname.trim().to_string(),
            })
        }
        "chat" => {
            let raw: RawChat =
                serde_json::from_value(value).map_err(|e| DecodeError::Json(e.to_string()))?;
            let to = raw.to.filter(|to| !to.is_empty());
            Ok(Inbound::Chat(ChatMessage {
                from: raw.from,
                is_private: to.is_some(),
                to,
                content: raw.content,
            }))
        }
        other => Err(DecodeError::UnsupportedType(other.to_string())),
    }
}

/// Encode a chat message for delivery.
pub fn encode_chat(message: &ChatMessage) -> Result<Frame, serde_json::Error> {
    serde_json::to_string(&Outbound::Chat(message)).map(Frame::from)
}

/// Encode the membership broadcast sent after every join, leave and rename.
pub fn encode_user_list(nicknames: &[String]) -> Result<Frame, serde_json::Error> {
    serde_json::to_string(&Outbound::Userlist { nicknames }).map(Frame::from)
}
