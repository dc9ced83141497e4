use axum::{
    Extension, Json,
    extract::{Path, State},
};

use huddle_types::api::{ChatKind, Claims};
use huddle_types::events::PushFrame;

use crate::auth::AppState;
use crate::error::ApiError;

/// Ephemeral typing signal: nothing is persisted, the frame just echoes the
/// conversation reference so receivers can test relevance. Throttling is a
/// client courtesy, not enforced here.
pub async fn send_typing(
    State(state): State<AppState>,
    Path((kind, id)): Path<(ChatKind, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .bus
        .publish(PushFrame::typing(claims.sub, claims.name, kind, id));

    Ok(Json(serde_json::json!({ "ok": true })))
}
