use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use huddle_types::api::{Claims, ToggleReactionRequest};
use huddle_types::events::PushFrame;
use huddle_types::models::ReactionMap;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::messages::group_reactions;

/// Toggle the caller's reaction on a message, then publish the message's
/// full recomputed aggregation so every viewer overwrites rather than
/// merges. The on/off race is serialized by the unique reaction row.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<Json<ReactionMap>, ApiError> {
    if req.emoji.is_empty() {
        return Err(ApiError::BadRequest("emoji must not be empty".into()));
    }

    let message = state
        .db
        .get_message(&message_id)?
        .ok_or(ApiError::NotFound)?;

    if !state.db.is_member(&message.channel_id, &claims.sub)? {
        return Err(ApiError::Forbidden);
    }

    let reaction_id = Uuid::new_v4().to_string();
    state
        .db
        .toggle_reaction(&reaction_id, &message_id, &claims.sub, &req.emoji)?;

    let rows = state.db.reactions_for_message(&message_id)?;
    let reactions = group_reactions(&rows)
        .remove(&message_id)
        .unwrap_or_default();

    state.bus.publish(PushFrame::reaction(
        message.channel_id,
        message_id,
        reactions.clone(),
    ));

    Ok(Json(reactions))
}
