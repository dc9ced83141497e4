use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use huddle_db::models::{MessageRow, ReactionRow};
use huddle_types::api::{ChatKind, Claims, PostMessageRequest};
use huddle_types::events::{MessageEvent, PushFrame};
use huddle_types::models::{Message, ReactionGroup, ReactionMap, UserProfile};

use crate::auth::AppState;
use crate::conversations;
use crate::error::ApiError;

/// Read policy: the most recent 100 messages, served oldest first.
pub const MESSAGE_PAGE_SIZE: u32 = 100;

pub async fn list_messages(
    State(state): State<AppState>,
    Path((kind, id)): Path<(ChatKind, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let st = state.clone();
    let user_id = claims.sub.clone();

    // Run the blocking DB work off the async runtime
    let messages = tokio::task::spawn_blocking(move || {
        let channel = match conversations::resolve_for_listing(&st.db, &user_id, kind, &id)? {
            Some(channel) => channel,
            None => return Ok(Vec::new()),
        };

        let rows = st.db.recent_messages(&channel.id, MESSAGE_PAGE_SIZE)?;
        let message_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reaction_rows = st.db.reactions_for_messages(&message_ids)?;

        let mut grouped = group_reactions(&reaction_rows);
        let messages = rows
            .into_iter()
            .map(|row| {
                let reactions = grouped.remove(&row.id).unwrap_or_default();
                message_from_row(row, reactions)
            })
            .collect();

        Ok::<_, ApiError>(messages)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    Ok(Json(messages))
}

pub async fn post_message(
    State(state): State<AppState>,
    Path((kind, id)): Path<(ChatKind, String)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".into()));
    }

    let channel = conversations::resolve_conversation(&state.db, &claims.sub, kind, &id)?;

    let sender = state
        .db
        .get_user_by_id(&claims.sub)?
        .ok_or(ApiError::Unauthorized)?;

    let message_id = Uuid::new_v4().to_string();
    let created_at = state
        .db
        .insert_message(&message_id, &channel.id, &claims.sub, text)?;

    let message = Message {
        id: message_id.clone(),
        channel_id: channel.id.clone(),
        sender_id: claims.sub.clone(),
        content: text.to_string(),
        created_at: parse_timestamp(&created_at, &message_id),
        sender: UserProfile {
            id: sender.id,
            name: sender.name,
            username: sender.username,
            email: sender.email,
            avatar: sender.avatar,
        },
        reactions: ReactionMap::new(),
    };

    // Fan out to every open push connection, flagged so DM receivers can
    // route a frame for a channel they have never seen.
    state.bus.publish(PushFrame::Message(MessageEvent {
        message: message.clone(),
        is_direct: channel.is_direct,
    }));

    Ok((StatusCode::CREATED, Json(message)))
}

/// Fold raw reaction rows into per-message grouped aggregations.
pub(crate) fn group_reactions(rows: &[ReactionRow]) -> HashMap<String, ReactionMap> {
    let mut by_message: HashMap<String, ReactionMap> = HashMap::new();
    for row in rows {
        let group = by_message
            .entry(row.message_id.clone())
            .or_default()
            .entry(row.emoji.clone())
            .or_insert_with(|| ReactionGroup {
                count: 0,
                user_ids: Vec::new(),
            });
        group.count += 1;
        group.user_ids.push(row.user_id.clone());
    }
    by_message
}

pub(crate) fn message_from_row(row: MessageRow, reactions: ReactionMap) -> Message {
    let created_at = parse_timestamp(&row.created_at, &row.id);
    Message {
        id: row.id,
        channel_id: row.channel_id,
        sender_id: row.sender_id.clone(),
        content: row.content,
        created_at,
        sender: UserProfile {
            id: row.sender_id,
            name: row.sender_name,
            username: row.sender_username,
            email: row.sender_email,
            avatar: row.sender_avatar,
        },
        reactions,
    }
}

fn parse_timestamp(raw: &str, message_id: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt created_at '{}' on message '{}': {}", raw, message_id, e);
        chrono::DateTime::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_rows_fold_into_grouped_counts() {
        let rows = vec![
            ReactionRow { message_id: "m1".into(), user_id: "a".into(), emoji: "👍".into() },
            ReactionRow { message_id: "m1".into(), user_id: "b".into(), emoji: "👍".into() },
            ReactionRow { message_id: "m1".into(), user_id: "a".into(), emoji: "🎉".into() },
            ReactionRow { message_id: "m2".into(), user_id: "c".into(), emoji: "👍".into() },
        ];

        let grouped = group_reactions(&rows);
        let m1 = &grouped["m1"];
        assert_eq!(m1["👍"].count, 2);
        assert_eq!(m1["👍"].user_ids, vec!["a", "b"]);
        assert_eq!(m1["🎉"].count, 1);
        assert_eq!(grouped["m2"]["👍"].count, 1);
    }
}
