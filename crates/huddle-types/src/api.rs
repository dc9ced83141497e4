use serde::{Deserialize, Serialize};

use crate::models::Message;

// -- JWT Claims --

/// JWT claims shared between huddle-api (REST middleware) and
/// huddle-gateway (WebSocket upgrade). Canonical definition lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub exp: usize,
}

// -- Conversation references --

/// What kind of conversation a reference points at. For `Dm`, the id in the
/// reference is the *other participant's user id*, not a channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Channel,
    Dm,
}

impl ChatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatKind::Channel => "channel",
            ChatKind::Dm => "dm",
        }
    }
}

/// Logical conversation reference used by every read/write API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub kind: ChatKind,
    pub id: String,
}

impl ChatRef {
    pub fn channel(id: impl Into<String>) -> Self {
        Self { kind: ChatKind::Channel, id: id.into() }
    }

    pub fn dm(partner_id: impl Into<String>) -> Self {
        Self { kind: ChatKind::Dm, id: partner_id.into() }
    }
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: String,
    pub name: String,
    pub token: String,
}

// -- Channels --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageRequest {
    pub text: String,
}

// -- Reactions --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

// -- Search --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub message: Message,
    /// None for DM channels.
    pub channel_name: Option<String>,
    pub is_direct: bool,
    /// The other participant when the hit is in a DM, for navigation.
    pub dm_user_id: Option<String>,
}
