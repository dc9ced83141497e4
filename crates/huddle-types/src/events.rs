use serde::{Deserialize, Serialize};

use crate::api::ChatKind;
use crate::models::{Message, ReactionMap};

/// Frames fanned out over the push channel. New-message frames carry no
/// `type` discriminator (clients recognize them by shape); typing and
/// reaction frames are tagged. The untagged enum mirrors that wire format:
/// tagged variants are tried first, so a frame with a `type` field can
/// never be mistaken for a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PushFrame {
    Signal(Signal),
    Message(MessageEvent),
}

/// A posted message plus whether its channel is a DM. Receivers that have
/// never seen the DM channel id need the flag to route the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    #[serde(flatten)]
    pub message: Message,
    pub is_direct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Signal {
    /// Ephemeral presence signal; never persisted. `kind`/`id` echo the
    /// conversation reference the typist is composing into.
    #[serde(rename_all = "camelCase")]
    Typing {
        user_id: String,
        name: String,
        kind: ChatKind,
        id: String,
    },

    /// The full recomputed aggregation for one message. Authoritative:
    /// receivers overwrite, never merge.
    #[serde(rename_all = "camelCase")]
    Reaction {
        channel_id: String,
        message_id: String,
        reactions: ReactionMap,
    },
}

impl PushFrame {
    pub fn typing(user_id: impl Into<String>, name: impl Into<String>, kind: ChatKind, id: impl Into<String>) -> Self {
        PushFrame::Signal(Signal::Typing {
            user_id: user_id.into(),
            name: name.into(),
            kind,
            id: id.into(),
        })
    }

    pub fn reaction(channel_id: impl Into<String>, message_id: impl Into<String>, reactions: ReactionMap) -> Self {
        PushFrame::Signal(Signal::Reaction {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            reactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use chrono::Utc;

    fn sample_message() -> Message {
        Message {
            id: "m1".into(),
            channel_id: "c1".into(),
            sender_id: "u1".into(),
            content: "hello".into(),
            created_at: Utc::now(),
            sender: UserProfile {
                id: "u1".into(),
                name: "Ada".into(),
                username: "ada".into(),
                email: "ada@example.com".into(),
                avatar: None,
            },
            reactions: ReactionMap::new(),
        }
    }

    #[test]
    fn message_frame_has_no_type_field() {
        let frame = PushFrame::Message(MessageEvent {
            message: sample_message(),
            is_direct: false,
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("type").is_none());
        assert_eq!(json["channelId"], "c1");
        assert_eq!(json["isDirect"], false);
    }

    #[test]
    fn typing_frame_is_tagged() {
        let frame = PushFrame::typing("u2", "Grace", ChatKind::Dm, "u1");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["userId"], "u2");
        assert_eq!(json["kind"], "dm");
    }

    #[test]
    fn frames_deserialize_by_shape() {
        let typing = r#"{"type":"typing","userId":"u2","name":"Grace","kind":"channel","id":"general"}"#;
        assert!(matches!(
            serde_json::from_str::<PushFrame>(typing).unwrap(),
            PushFrame::Signal(Signal::Typing { .. })
        ));

        let reaction = r#"{"type":"reaction","channelId":"c1","messageId":"m1","reactions":{"👍":{"count":1,"userIds":["u1"]}}}"#;
        assert!(matches!(
            serde_json::from_str::<PushFrame>(reaction).unwrap(),
            PushFrame::Signal(Signal::Reaction { .. })
        ));

        let message = serde_json::to_string(&PushFrame::Message(MessageEvent {
            message: sample_message(),
            is_direct: true,
        }))
        .unwrap();
        match serde_json::from_str::<PushFrame>(&message).unwrap() {
            PushFrame::Message(ev) => assert!(ev.is_direct),
            other => panic!("expected message frame, got {other:?}"),
        }
    }
}
