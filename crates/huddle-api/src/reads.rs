use axum::{
    Extension, Json,
    extract::{Path, State},
};

use huddle_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Upsert the caller's last-read marker for a channel to now. Also called
/// implicitly by clients auto-marking the conversation they are viewing.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.db.get_channel(&channel_id)?.is_none() {
        return Err(ApiError::NotFound);
    }

    state.db.mark_read(&channel_id, &claims.sub)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Server-derived unread set: channels with a non-self message newer than
/// the caller's last-read marker. Clients treat this as authoritative on
/// every refetch.
pub async fn list_unread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<String>>, ApiError> {
    let ids = state.db.unread_channel_ids(&claims.sub)?;
    Ok(Json(ids))
}
